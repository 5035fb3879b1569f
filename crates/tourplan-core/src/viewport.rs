use std::fmt;

use tourplan_api::{Error, MapRequest, PlannerClient};

use crate::input::ZoomIntent;
use crate::turn::{ChatTurn, MapPayload, Route};

pub const MIN_ZOOM: u8 = 8;
pub const MAX_ZOOM: u8 = 18;
pub const DEFAULT_ZOOM: u8 = 12;
/// Output size requested from the map service.
pub const MAP_SIZE: &str = "800x600";

/// What the map pane shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapViewport {
    route: Option<Route>,
    image_reference: Option<String>,
    zoom: u8,
    loading: bool,
}

impl Default for MapViewport {
    fn default() -> Self {
        Self {
            route: None,
            image_reference: None,
            zoom: DEFAULT_ZOOM,
            loading: false,
        }
    }
}

impl MapViewport {
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn image_reference(&self) -> Option<&str> {
        self.image_reference.as_deref()
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

/// User-visible reason a map regeneration failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapAlert {
    /// The service has no regeneration endpoint (404).
    EndpointUnavailable,
    NetworkUnreachable,
    Failed(String),
}

impl MapAlert {
    fn from_error(err: &Error) -> Self {
        match err {
            Error::Http(_) => MapAlert::NetworkUnreachable,
            _ if err.status() == Some(404) => MapAlert::EndpointUnavailable,
            other => MapAlert::Failed(other.to_string()),
        }
    }
}

impl fmt::Display for MapAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapAlert::EndpointUnavailable => {
                f.write_str("Map zoom is unavailable: the map service endpoint was not found.")
            }
            MapAlert::NetworkUnreachable => f.write_str(
                "Could not reach the map service. Check your connection and that the server is running.",
            ),
            MapAlert::Failed(detail) => write!(f, "Failed to update the map: {detail}"),
        }
    }
}

/// Why a zoom request did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomSkip {
    NoRoute,
    /// A regeneration is already in flight; this request is dropped.
    Busy,
    /// Clamped target equals the current zoom.
    Unchanged,
}

pub enum RegenerateStart {
    Started(RegenerateJob),
    Skipped(ZoomSkip),
    /// No token; the caller must sign the session out.
    MissingToken,
}

/// Terminal state of one regeneration, as seen by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerateOutcome {
    Applied { zoom: u8 },
    Failed(MapAlert),
    Unauthorized,
    /// The route changed or was cleared while the request was in flight.
    Stale,
}

/// Owns the map sub-state. All zoom changes go through here.
#[derive(Debug, Default)]
pub struct Viewport {
    state: MapViewport,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &MapViewport {
        &self.state
    }

    /// Adopt the map carried by an assistant turn. Turns without a map are
    /// ignored. Returns whether the route identity changed.
    pub fn set_from_turn(&mut self, turn: &ChatTurn) -> bool {
        turn.map.as_ref().is_some_and(|map| self.set_from_map(map))
    }

    /// Show `map` at the default zoom.
    pub fn set_from_map(&mut self, map: &MapPayload) -> bool {
        let changed = self.state.route.as_ref() != Some(&map.journey);
        self.state.route = Some(map.journey.clone());
        self.state.image_reference = Some(map.image_reference.clone());
        self.state.zoom = DEFAULT_ZOOM;
        changed
    }

    /// Drop route, image and zoom. `loading` survives so an outstanding
    /// regeneration still blocks new ones until its reply is handled.
    pub fn clear(&mut self) {
        self.state = MapViewport {
            loading: self.state.loading,
            ..MapViewport::default()
        };
    }

    /// Release the in-flight marker for a reply that will not be applied.
    pub fn abandon_regenerate(&mut self) {
        self.state.loading = false;
    }

    /// Target zoom for `intent`, or why nothing should happen.
    pub fn plan(&self, intent: ZoomIntent) -> Result<u8, ZoomSkip> {
        if self.state.route.is_none() {
            return Err(ZoomSkip::NoRoute);
        }
        if self.state.loading {
            return Err(ZoomSkip::Busy);
        }
        let target = intent.target(self.state.zoom);
        if target == self.state.zoom {
            return Err(ZoomSkip::Unchanged);
        }
        Ok(target)
    }

    /// Mark the viewport busy and hand back the request to run.
    pub fn begin_regenerate(
        &mut self,
        zoom: u8,
        client: &PlannerClient,
        token: Option<&str>,
    ) -> RegenerateStart {
        let Some(route) = self.state.route.clone() else {
            return RegenerateStart::Skipped(ZoomSkip::NoRoute);
        };
        if self.state.loading {
            return RegenerateStart::Skipped(ZoomSkip::Busy);
        }
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return RegenerateStart::MissingToken;
        };

        self.state.loading = true;
        RegenerateStart::Started(RegenerateJob {
            client: client.clone(),
            token: token.to_string(),
            route,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
        })
    }

    /// Apply a finished regeneration. Always clears `loading`.
    pub fn finish_regenerate(&mut self, result: RegenerateResult) -> RegenerateOutcome {
        self.state.loading = false;

        match result.response {
            Err(err) if err.is_unauthorized() => RegenerateOutcome::Unauthorized,
            Err(err) => {
                tracing::warn!(error = %err, zoom = result.zoom, "map regeneration failed");
                RegenerateOutcome::Failed(MapAlert::from_error(&err))
            }
            Ok(_) if self.state.route.as_ref() != Some(&result.route) => {
                tracing::warn!(zoom = result.zoom, "dropping map for a route that is no longer shown");
                RegenerateOutcome::Stale
            }
            Ok(image) => {
                self.state.image_reference = Some(image);
                self.state.zoom = result.zoom;
                RegenerateOutcome::Applied { zoom: result.zoom }
            }
        }
    }
}

/// A map regeneration detached from the viewport so it can run elsewhere.
pub struct RegenerateJob {
    client: PlannerClient,
    token: String,
    route: Route,
    zoom: u8,
}

impl RegenerateJob {
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub async fn run(self) -> RegenerateResult {
        let request = MapRequest {
            origin: self.route.origin.clone(),
            destination: self.route.destination.clone(),
            zoom: self.zoom,
            size: MAP_SIZE.to_string(),
        };
        let response = self
            .client
            .render_map(&self.token, &request)
            .await
            .map(|r| r.map_image_url);
        RegenerateResult {
            route: self.route,
            zoom: self.zoom,
            response,
        }
    }
}

/// Raw result of a [`RegenerateJob`], fed back through
/// [`Viewport::finish_regenerate`].
#[derive(Debug)]
pub struct RegenerateResult {
    route: Route,
    zoom: u8,
    response: Result<String, Error>,
}

#[cfg(test)]
mod tests {
    use tourplan_api::{Error, MapResponse};

    use super::{
        DEFAULT_ZOOM, MapAlert, RegenerateOutcome, RegenerateStart, Viewport, ZoomSkip,
    };
    use crate::input::ZoomIntent;
    use crate::testing::ScriptedBackend;
    use crate::turn::{ChatTurn, MapPayload, Route};

    fn route(origin: &str, destination: &str) -> Route {
        Route {
            origin: origin.to_string(),
            destination: destination.to_string(),
        }
    }

    fn map_turn(image: &str, route: Route) -> ChatTurn {
        ChatTurn::assistant("plan").with_map(MapPayload {
            image_reference: image.to_string(),
            journey: route,
        })
    }

    fn started(start: RegenerateStart) -> super::RegenerateJob {
        match start {
            RegenerateStart::Started(job) => job,
            RegenerateStart::Skipped(skip) => panic!("skipped: {skip:?}"),
            RegenerateStart::MissingToken => panic!("missing token"),
        }
    }

    #[test]
    fn assistant_map_sets_route_and_resets_zoom() {
        let mut viewport = Viewport::new();
        assert!(!viewport.set_from_turn(&ChatTurn::assistant("no map")));
        assert!(viewport.state().route().is_none());

        assert!(viewport.set_from_turn(&map_turn("X", route("NYC", "Paris"))));
        assert_eq!(viewport.state().image_reference(), Some("X"));
        assert_eq!(viewport.state().zoom(), DEFAULT_ZOOM);

        // Same route again: no identity change, same state.
        let before = viewport.state().clone();
        assert!(!viewport.set_from_turn(&map_turn("X", route("NYC", "Paris"))));
        assert_eq!(viewport.state(), &before);
    }

    #[test]
    fn plan_reports_skips() {
        let mut viewport = Viewport::new();
        assert_eq!(viewport.plan(ZoomIntent::ZoomIn), Err(ZoomSkip::NoRoute));

        viewport.set_from_turn(&map_turn("X", route("NYC", "Paris")));
        assert_eq!(viewport.plan(ZoomIntent::ZoomReset), Err(ZoomSkip::Unchanged));
        assert_eq!(viewport.plan(ZoomIntent::ZoomIn), Ok(13));
    }

    #[tokio::test]
    async fn regenerate_commits_zoom_and_image() {
        let (client, script) = ScriptedBackend::new();
        script.push_map(Ok(MapResponse {
            map_image_url: "Y".to_string(),
        }));
        let mut viewport = Viewport::new();
        viewport.set_from_turn(&map_turn("X", route("NYC", "Paris")));

        let job = started(viewport.begin_regenerate(15, &client, Some("t")));
        assert!(viewport.state().is_loading());
        assert_eq!(viewport.plan(ZoomIntent::ZoomIn), Err(ZoomSkip::Busy));

        let outcome = viewport.finish_regenerate(job.run().await);
        assert_eq!(outcome, RegenerateOutcome::Applied { zoom: 15 });
        assert_eq!(viewport.state().image_reference(), Some("Y"));
        assert_eq!(viewport.state().zoom(), 15);
        assert!(!viewport.state().is_loading());

        let request = script.last_map_request().expect("map request");
        assert_eq!(request.origin, "NYC");
        assert_eq!(request.zoom, 15);
        assert_eq!(request.size, super::MAP_SIZE);
    }

    #[tokio::test]
    async fn failure_keeps_image_and_zoom() {
        let (client, script) = ScriptedBackend::new();
        script.push_map(Err(Error::Api {
            status: 404,
            detail: "Not Found".to_string(),
        }));
        script.push_map(Err(Error::Http("connection refused".into())));
        script.push_map(Err(Error::Api {
            status: 500,
            detail: "renderer crashed".to_string(),
        }));
        let mut viewport = Viewport::new();
        viewport.set_from_turn(&map_turn("X", route("NYC", "Paris")));

        let mut alerts = Vec::new();
        for _ in 0..3 {
            let job = started(viewport.begin_regenerate(13, &client, Some("t")));
            match viewport.finish_regenerate(job.run().await) {
                RegenerateOutcome::Failed(alert) => alerts.push(alert),
                other => panic!("expected failure, got {other:?}"),
            }
            assert!(!viewport.state().is_loading());
            assert_eq!(viewport.state().image_reference(), Some("X"));
            assert_eq!(viewport.state().zoom(), DEFAULT_ZOOM);
        }

        assert_eq!(alerts[0], MapAlert::EndpointUnavailable);
        assert_eq!(alerts[1], MapAlert::NetworkUnreachable);
        assert!(alerts[2].to_string().contains("renderer crashed"));
    }

    #[tokio::test]
    async fn response_for_replaced_route_is_dropped() {
        let (client, script) = ScriptedBackend::new();
        script.push_map(Ok(MapResponse {
            map_image_url: "old-route-zoomed".to_string(),
        }));
        let mut viewport = Viewport::new();
        viewport.set_from_turn(&map_turn("X", route("NYC", "Paris")));

        let job = started(viewport.begin_regenerate(14, &client, Some("t")));
        viewport.set_from_turn(&map_turn("Z", route("Rome", "Milan")));

        let outcome = viewport.finish_regenerate(job.run().await);
        assert_eq!(outcome, RegenerateOutcome::Stale);
        assert_eq!(viewport.state().image_reference(), Some("Z"));
        assert_eq!(viewport.state().zoom(), DEFAULT_ZOOM);
        assert!(!viewport.state().is_loading());
    }

    #[test]
    fn clear_keeps_outstanding_regeneration_marked() {
        let (client, _) = ScriptedBackend::new();
        let mut viewport = Viewport::new();
        viewport.set_from_turn(&map_turn("X", route("NYC", "Paris")));
        let _job = started(viewport.begin_regenerate(13, &client, Some("t")));

        viewport.clear();
        assert!(viewport.state().route().is_none());
        assert!(viewport.state().is_loading());

        viewport.set_from_turn(&map_turn("Z", route("Rome", "Milan")));
        assert_eq!(viewport.plan(ZoomIntent::ZoomIn), Err(ZoomSkip::Busy));

        viewport.abandon_regenerate();
        assert_eq!(viewport.plan(ZoomIntent::ZoomIn), Ok(13));
    }

    #[test]
    fn missing_token_does_not_mark_loading() {
        let (client, _) = ScriptedBackend::new();
        let mut viewport = Viewport::new();
        viewport.set_from_turn(&map_turn("X", route("NYC", "Paris")));

        assert!(matches!(
            viewport.begin_regenerate(13, &client, None),
            RegenerateStart::MissingToken
        ));
        assert!(!viewport.state().is_loading());
    }
}
