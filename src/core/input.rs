//! Input events fed to the engine by the host.
//!
//! Pointer and touch coordinates are client pixels; the engine reduces them to NDC through
//! its viewport rectangle.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Key {
    Escape,
    ArrowRight,
    ArrowDown,
    ArrowLeft,
    ArrowUp,
    Enter,
}

impl Key {
    /// Parse a DOM-style key name. Keys the engine does not bind yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "Escape" | "Esc" => Key::Escape,
            "ArrowRight" => Key::ArrowRight,
            "ArrowDown" => Key::ArrowDown,
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowUp" => Key::ArrowUp,
            "Enter" => Key::Enter,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove { x: f32, y: f32 },
    PointerDown { x: f32, y: f32 },
    TouchMove { x: f32, y: f32 },
    TouchStart { x: f32, y: f32 },
    /// Drag delta in pixels; orbits the camera.
    PointerDrag { dx: f32, dy: f32 },
    Key(Key),
    /// Rendering surface size changed.
    Resize { width: f32, height: f32 },
    /// Page scrolled; the surface now sits at `left`/`top` in client pixels.
    Scroll { left: f32, top: f32 },
    Visibility { visible: bool },
}

/// Listener category an event arrives through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Pointer,
    Touch,
    Keyboard,
    Resize,
    Scroll,
    Visibility,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 6] = [
        ListenerKind::Pointer,
        ListenerKind::Touch,
        ListenerKind::Keyboard,
        ListenerKind::Resize,
        ListenerKind::Scroll,
        ListenerKind::Visibility,
    ];
}

impl InputEvent {
    pub fn listener(&self) -> ListenerKind {
        match self {
            InputEvent::PointerMove { .. }
            | InputEvent::PointerDown { .. }
            | InputEvent::PointerDrag { .. } => ListenerKind::Pointer,
            InputEvent::TouchMove { .. } | InputEvent::TouchStart { .. } => ListenerKind::Touch,
            InputEvent::Key(_) => ListenerKind::Keyboard,
            InputEvent::Resize { .. } => ListenerKind::Resize,
            InputEvent::Scroll { .. } => ListenerKind::Scroll,
            InputEvent::Visibility { .. } => ListenerKind::Visibility,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bound_keys_only() {
        assert_eq!(Key::parse("ArrowLeft"), Some(Key::ArrowLeft));
        assert_eq!(Key::parse("Esc"), Some(Key::Escape));
        assert_eq!(Key::parse("a"), None);
        assert_eq!(Key::parse("arrowleft"), None);
    }

    #[test]
    fn touch_routes_through_touch_listener() {
        assert_eq!(
            InputEvent::TouchStart { x: 0.0, y: 0.0 }.listener(),
            ListenerKind::Touch
        );
        assert_eq!(
            InputEvent::PointerDrag { dx: 1.0, dy: 0.0 }.listener(),
            ListenerKind::Pointer
        );
    }
}
