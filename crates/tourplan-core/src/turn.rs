use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tourplan_api::{JourneyDetails, Role};

static LAST_TURN_ID: AtomicI64 = AtomicI64::new(0);

/// Origin and destination of a planned journey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl From<JourneyDetails> for Route {
    fn from(journey: JourneyDetails) -> Self {
        Self {
            origin: journey.origin,
            destination: journey.destination,
        }
    }
}

/// Map attached to an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapPayload {
    pub image_reference: String,
    pub journey: Route,
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Only ever set on assistant turns.
    pub map: Option<MapPayload>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: next_turn_id(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            map: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: next_turn_id(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            map: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_map(mut self, map: MapPayload) -> Self {
        self.map = Some(map);
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Millisecond-clock ids, bumped when two turns land in the same millisecond
/// so ordering by id matches append order within a process.
pub fn next_turn_id() -> String {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_TURN_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1).to_string()
}

// ---------------------------------------------------------------------------
// Persisted shape
// ---------------------------------------------------------------------------

/// On-disk form of a turn. Map fields are flat and independently optional.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredTurn {
    id: String,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    map_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    journey_details: Option<JourneyDetails>,
}

impl From<&ChatTurn> for StoredTurn {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            id: turn.id.clone(),
            role: turn.role,
            content: turn.content.clone(),
            timestamp: turn.timestamp,
            map_image_url: turn.map.as_ref().map(|m| m.image_reference.clone()),
            journey_details: turn.map.as_ref().map(|m| JourneyDetails {
                origin: m.journey.origin.clone(),
                destination: m.journey.destination.clone(),
            }),
        }
    }
}

impl From<StoredTurn> for ChatTurn {
    fn from(stored: StoredTurn) -> Self {
        Self {
            id: stored.id,
            role: stored.role,
            content: stored.content,
            timestamp: stored.timestamp,
            map: map_payload(stored.map_image_url, stored.journey_details),
        }
    }
}

/// A payload needs both an image and a route; either alone is dropped.
pub(crate) fn map_payload(
    image: Option<String>,
    journey: Option<JourneyDetails>,
) -> Option<MapPayload> {
    match (image, journey) {
        (Some(image_reference), Some(journey)) if !image_reference.is_empty() => {
            Some(MapPayload {
                image_reference,
                journey: journey.into(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{map_payload, next_turn_id};
    use tourplan_api::JourneyDetails;

    #[test]
    fn ids_increase_within_a_millisecond() {
        let ids: Vec<i64> = (0..50)
            .map(|_| next_turn_id().parse().expect("numeric id"))
            .collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn payload_requires_image_and_journey() {
        let journey = JourneyDetails {
            origin: "NYC".to_string(),
            destination: "Paris".to_string(),
        };
        assert!(map_payload(Some("X".to_string()), None).is_none());
        assert!(map_payload(None, Some(journey.clone())).is_none());
        assert!(map_payload(Some(String::new()), Some(journey.clone())).is_none());

        let payload = map_payload(Some("X".to_string()), Some(journey)).expect("payload");
        assert_eq!(payload.image_reference, "X");
        assert_eq!(payload.journey.destination, "Paris");
    }
}
