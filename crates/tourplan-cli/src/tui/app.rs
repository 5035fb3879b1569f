use std::future::Future;
use std::pin::Pin;

use crossterm::event::{
    KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::{Position, Rect};
use tourplan_core::{
    Dashboard, Focus, MapButton, SessionPhase, SignOutReason, SubmitReply, SubmitResult,
    ZoomInput, ZoomReply, ZoomResult, ZoomStart,
};

use crate::tui::dialog::Modal;

/// Prompts offered while the conversation is empty; Alt+1..4 fills one in.
pub const SUGGESTIONS: [(&str, &str); 4] = [
    ("Plan a weekend trip", "Plan a weekend trip to Paris"),
    ("Find train routes", "Find trains from New York to Boston"),
    ("Hotel recommendations", "Recommend hotels in Tokyo under $150/night"),
    ("Local cuisine", "What are the best restaurants in Rome?"),
];

pub type Pending<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Screen regions the renderer publishes for mouse hit-testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct HitAreas {
    pub map: Rect,
    pub zoom_in: Rect,
    pub zoom_out: Rect,
    pub reset: Rect,
}

impl HitAreas {
    fn button_at(&self, position: Position) -> Option<MapButton> {
        [
            (self.zoom_in, MapButton::ZoomIn),
            (self.zoom_out, MapButton::ZoomOut),
            (self.reset, MapButton::Reset),
        ]
        .into_iter()
        .find(|(area, _)| area.contains(position))
        .map(|(_, button)| button)
    }
}

pub struct App {
    pub dashboard: Dashboard,
    pub input: String,
    pub cursor_pos: usize,
    pub focus: Focus,
    pub scroll_offset: u16,
    /// Maximum scroll offset (set by the renderer each frame).
    pub max_scroll: u16,
    pub hit_areas: HitAreas,
    pub modal: Option<Modal>,
    pub chat_request: Option<Pending<SubmitReply>>,
    pub map_request: Option<Pending<ZoomReply>>,
    pub should_quit: bool,
    /// Toggled by a timer to animate the busy indicators.
    pub spinner_on: bool,
}

impl App {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard,
            input: String::new(),
            cursor_pos: 0,
            focus: Focus::TextEntry,
            scroll_offset: 0,
            max_scroll: 0,
            hit_areas: HitAreas::default(),
            modal: None,
            chat_request: None,
            map_request: None,
            should_quit: false,
            spinner_on: true,
        }
    }

    /// Set once the dashboard has been signed out, by either path.
    pub fn sign_out_reason(&self) -> Option<SignOutReason> {
        match self.dashboard.phase() {
            SessionPhase::SignedOut(reason) => Some(reason),
            SessionPhase::Active => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.dashboard.is_loading() || self.dashboard.viewport().is_loading()
    }

    /// Handle a keyboard event. Returns true if the event was consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c' | 'q') if ctrl => {
                self.should_quit = true;
                true
            }

            _ if self.modal.is_some() => self.handle_modal_key(key),

            KeyCode::Char('l') if ctrl => {
                self.modal = Some(Modal::ConfirmClear);
                true
            }
            KeyCode::Char('o') if ctrl => {
                self.dashboard.sign_out();
                self.should_quit = true;
                true
            }

            KeyCode::Char(digit @ '1'..='4') if key.modifiers.contains(KeyModifiers::ALT) => {
                self.apply_suggestion(digit);
                true
            }

            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::TextEntry => Focus::Elsewhere,
                    Focus::Elsewhere => Focus::TextEntry,
                };
                true
            }

            // Submit
            KeyCode::Enter
                if !key
                    .modifiers
                    .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
            {
                if self.focus == Focus::TextEntry {
                    self.submit();
                }
                true
            }

            // Newline in input
            KeyCode::Enter => {
                if self.focus == Focus::TextEntry {
                    self.insert_char('\n');
                }
                true
            }

            KeyCode::Esc => {
                self.focus = Focus::TextEntry;
                true
            }

            KeyCode::Char(ch) if !ctrl => {
                let input = ZoomInput::Key {
                    ch,
                    focus: self.focus,
                };
                if let Some(start) = self.dashboard.handle_zoom_input(input) {
                    self.apply_zoom_start(start);
                } else if self.focus == Focus::TextEntry {
                    self.insert_char(ch);
                }
                true
            }

            KeyCode::Backspace if self.focus == Focus::TextEntry => {
                if let Some(prev) = self.input[..self.cursor_pos].chars().next_back() {
                    self.cursor_pos -= prev.len_utf8();
                    self.input.remove(self.cursor_pos);
                }
                true
            }
            KeyCode::Delete if self.focus == Focus::TextEntry => {
                if self.cursor_pos < self.input.len() {
                    self.input.remove(self.cursor_pos);
                }
                true
            }
            KeyCode::Left if self.focus == Focus::TextEntry => {
                if let Some(prev) = self.input[..self.cursor_pos].chars().next_back() {
                    self.cursor_pos -= prev.len_utf8();
                }
                true
            }
            KeyCode::Right if self.focus == Focus::TextEntry => {
                if let Some(next) = self.input[self.cursor_pos..].chars().next() {
                    self.cursor_pos += next.len_utf8();
                }
                true
            }
            KeyCode::Home => {
                self.cursor_pos = 0;
                true
            }
            KeyCode::End => {
                self.cursor_pos = self.input.len();
                true
            }

            // Scroll history
            KeyCode::PageUp => {
                self.scroll_offset = self.scroll_offset.saturating_add(10).min(self.max_scroll);
                true
            }
            KeyCode::PageDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(10);
                true
            }

            _ => false,
        }
    }

    /// Handle a mouse event.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.modal.is_some() {
            return;
        }
        let position = Position::new(mouse.column, mouse.row);
        let over_map = self.hit_areas.map.contains(position);

        match mouse.kind {
            MouseEventKind::ScrollUp if over_map => {
                self.zoom_input(ZoomInput::Wheel { delta_y: -1.0 });
            }
            MouseEventKind::ScrollDown if over_map => {
                self.zoom_input(ZoomInput::Wheel { delta_y: 1.0 });
            }
            MouseEventKind::ScrollUp => {
                self.scroll_offset = self.scroll_offset.saturating_add(3).min(self.max_scroll);
            }
            MouseEventKind::ScrollDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(3);
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(button) = self.hit_areas.button_at(position) {
                    self.focus = Focus::Elsewhere;
                    self.zoom_input(ZoomInput::Button(button));
                } else if over_map {
                    self.focus = Focus::Elsewhere;
                } else {
                    self.focus = Focus::TextEntry;
                }
            }
            _ => {}
        }
    }

    pub fn finish_chat(&mut self, reply: SubmitReply) {
        self.chat_request = None;
        match self.dashboard.finish_submit(reply) {
            SubmitResult::Appended(_) => self.scroll_offset = 0,
            SubmitResult::SignedOut => self.should_quit = true,
            SubmitResult::Ignored | SubmitResult::Discarded => {}
        }
    }

    pub fn finish_map(&mut self, reply: ZoomReply) {
        self.map_request = None;
        let result = self.dashboard.finish_zoom(reply);
        self.apply_zoom_result(result);
    }

    pub fn toggle_spinner(&mut self) {
        self.spinner_on = !self.spinner_on;
    }

    fn handle_modal_key(&mut self, key: KeyEvent) -> bool {
        let Some(modal) = self.modal.as_ref() else {
            return false;
        };
        match (modal, key.code) {
            (Modal::ConfirmClear, KeyCode::Char('y' | 'Y')) => {
                self.modal = None;
                self.dashboard.clear();
                self.scroll_offset = 0;
            }
            (Modal::ConfirmClear, KeyCode::Char('n' | 'N') | KeyCode::Esc) => {
                self.modal = None;
            }
            (Modal::Alert(_), KeyCode::Enter | KeyCode::Esc) => {
                self.modal = None;
            }
            _ => {}
        }
        true
    }

    fn submit(&mut self) {
        let Some(ticket) = self.dashboard.begin_submit(&self.input) else {
            return;
        };
        self.input.clear();
        self.cursor_pos = 0;
        self.scroll_offset = 0;
        self.chat_request = Some(Box::pin(ticket.run()));
    }

    fn zoom_input(&mut self, input: ZoomInput) {
        if let Some(start) = self.dashboard.handle_zoom_input(input) {
            self.apply_zoom_start(start);
        }
    }

    fn apply_zoom_start(&mut self, start: ZoomStart) {
        match start {
            ZoomStart::Started(ticket) => {
                tracing::debug!(zoom = ticket.zoom(), "regenerating map");
                self.map_request = Some(Box::pin(ticket.run()));
            }
            ZoomStart::Finished(result) => self.apply_zoom_result(result),
        }
    }

    fn apply_zoom_result(&mut self, result: ZoomResult) {
        match result {
            ZoomResult::Alert(alert) => self.modal = Some(Modal::Alert(alert.to_string())),
            ZoomResult::SignedOut => self.should_quit = true,
            ZoomResult::Zoomed { .. } | ZoomResult::Unchanged(_) | ZoomResult::Stale => {}
        }
    }

    fn apply_suggestion(&mut self, digit: char) {
        if !self.dashboard.turns().is_empty() {
            return;
        }
        let index = digit as usize - '1' as usize;
        if let Some((_, prompt)) = SUGGESTIONS.get(index) {
            self.input = prompt.to_string();
            self.cursor_pos = self.input.len();
            self.focus = Focus::TextEntry;
        }
    }

    fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crossterm::event::{
        KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    };
    use parking_lot::Mutex;
    use ratatui::layout::Rect;
    use tourplan_api::HttpConfig;
    use tourplan_auth::CredentialStore;
    use tourplan_core::{Dashboard, Focus};
    use tourplan_db::{Slot, Store};

    use super::{App, HitAreas, SUGGESTIONS};
    use crate::tui::dialog::Modal;

    fn app() -> (App, Arc<Mutex<Store>>) {
        let store = Arc::new(Mutex::new(Store::open_in_memory().expect("store")));
        let credentials = CredentialStore::new("tourplan-test", Arc::clone(&store));
        credentials.save_token("tok").expect("token");
        let client = tourplan_api::http(HttpConfig {
            base_url: "http://127.0.0.1:9".to_string(),
        });
        let dashboard = Dashboard::start(client, Arc::clone(&store), credentials);
        (App::new(dashboard), store)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn zoom_keys_are_typed_while_input_has_focus() {
        let (mut app, _) = app();
        for ch in "a+0-".chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
        assert_eq!(app.input, "a+0-");
        assert!(app.map_request.is_none());
    }

    #[test]
    fn tab_moves_focus_to_the_map() {
        let (mut app, _) = app();
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Focus::Elsewhere);

        // No route yet, so the key is neither typed nor sent.
        app.handle_key(key(KeyCode::Char('+')));
        assert!(app.input.is_empty());
        assert!(app.map_request.is_none());

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.focus, Focus::TextEntry);
    }

    #[test]
    fn alt_digit_fills_a_suggestion() {
        let (mut app, _) = app();
        app.handle_key(KeyEvent::new(KeyCode::Char('3'), KeyModifiers::ALT));
        assert_eq!(app.input, SUGGESTIONS[2].1);
        assert_eq!(app.cursor_pos, app.input.len());
    }

    #[test]
    fn clear_asks_for_confirmation() {
        let (mut app, _) = app();
        app.handle_key(KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL));
        assert_eq!(app.modal, Some(Modal::ConfirmClear));

        // Other keys are swallowed while the modal is open.
        app.handle_key(key(KeyCode::Char('x')));
        assert!(app.input.is_empty());

        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.modal, None);
    }

    #[test]
    fn alert_is_dismissed_with_enter() {
        let (mut app, _) = app();
        app.modal = Some(Modal::Alert("Map zoom is unavailable".to_string()));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.modal, None);
    }

    #[test]
    fn sign_out_key_wipes_credentials_and_quits() {
        let (mut app, store) = app();
        app.handle_key(KeyEvent::new(KeyCode::Char('o'), KeyModifiers::CONTROL));

        assert!(app.should_quit);
        assert!(app.sign_out_reason().is_some());
        assert_eq!(store.lock().slots().get(Slot::Token).expect("get"), None);
    }

    #[test]
    fn wheel_outside_the_map_scrolls_messages() {
        let (mut app, _) = app();
        app.max_scroll = 20;
        app.hit_areas = HitAreas {
            map: Rect::new(40, 0, 40, 20),
            ..HitAreas::default()
        };

        app.handle_mouse(mouse(MouseEventKind::ScrollUp, 5, 5));
        assert_eq!(app.scroll_offset, 3);

        app.handle_mouse(mouse(MouseEventKind::ScrollUp, 50, 5));
        assert_eq!(app.scroll_offset, 3);
        assert!(app.map_request.is_none());

        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 50, 5));
        assert_eq!(app.focus, Focus::Elsewhere);
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 5));
        assert_eq!(app.focus, Focus::TextEntry);
    }

    #[test]
    fn blank_input_is_not_submitted() {
        let (mut app, _) = app();
        app.input = "   ".to_string();
        app.handle_key(key(KeyCode::Enter));
        assert!(app.chat_request.is_none());
        assert!(app.dashboard.turns().is_empty());
    }
}
