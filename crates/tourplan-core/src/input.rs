//! Keyboard, wheel and button input reduced to a single zoom intent.

use crate::viewport::{DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomIntent {
    ZoomIn,
    ZoomOut,
    ZoomReset,
}

impl ZoomIntent {
    /// Zoom level this intent asks for, clamped to the valid range.
    pub fn target(self, current: u8) -> u8 {
        match self {
            ZoomIntent::ZoomIn => current.saturating_add(1).clamp(MIN_ZOOM, MAX_ZOOM),
            ZoomIntent::ZoomOut => current.saturating_sub(1).clamp(MIN_ZOOM, MAX_ZOOM),
            ZoomIntent::ZoomReset => DEFAULT_ZOOM,
        }
    }
}

/// Where keyboard focus currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// A text-entry field; zoom keys are typed, not interpreted.
    TextEntry,
    Elsewhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapButton {
    ZoomIn,
    ZoomOut,
    Reset,
}

impl From<MapButton> for ZoomIntent {
    fn from(button: MapButton) -> Self {
        match button {
            MapButton::ZoomIn => ZoomIntent::ZoomIn,
            MapButton::ZoomOut => ZoomIntent::ZoomOut,
            MapButton::Reset => ZoomIntent::ZoomReset,
        }
    }
}

/// Raw input from any of the three sources that can drive the map zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomInput {
    Key { ch: char, focus: Focus },
    /// Vertical wheel delta over the map surface; negative scrolls up.
    Wheel { delta_y: f64 },
    Button(MapButton),
}

impl ZoomInput {
    pub fn intent(self) -> Option<ZoomIntent> {
        match self {
            ZoomInput::Key { focus: Focus::TextEntry, .. } => None,
            ZoomInput::Key { ch, .. } => match ch {
                '+' | '=' => Some(ZoomIntent::ZoomIn),
                '-' | '_' => Some(ZoomIntent::ZoomOut),
                '0' => Some(ZoomIntent::ZoomReset),
                _ => None,
            },
            ZoomInput::Wheel { delta_y } if delta_y < 0.0 => Some(ZoomIntent::ZoomIn),
            ZoomInput::Wheel { delta_y } if delta_y > 0.0 => Some(ZoomIntent::ZoomOut),
            ZoomInput::Wheel { .. } => None,
            ZoomInput::Button(button) => Some(button.into()),
        }
    }
}
