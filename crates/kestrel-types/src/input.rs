//! Input events delivered by the windowing layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    WheelUp,
    WheelDown,
    Other(u8),
}

/// A platform-neutral key code. Printable keys map to their ASCII code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Char(char),
    Escape,
    Enter,
    Backspace,
    Tab,
    Space,
    Left,
    Right,
    Up,
    Down,
    Shift,
    Control,
    Alt,
    F(u8),
    Unknown(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    MouseDown { x: f32, y: f32, button: MouseButton },
    MouseUp { x: f32, y: f32, button: MouseButton },
    MouseMove { x: f32, y: f32 },
    MouseScroll { dx: f32, dy: f32 },
    KeyDown(Key),
    KeyUp(Key),
    /// Text input, after keyboard layout translation.
    Char(char),
    /// Touch points; an empty list means all touches ended.
    Touch(Vec<(f32, f32)>),
    Resized { width: u32, height: u32 },
    Focus(bool),
    Quit,
}

impl InputEvent {
    pub fn is_mouse(&self) -> bool {
        matches!(
            self,
            Self::MouseDown { .. } | Self::MouseUp { .. } | Self::MouseMove { .. } | Self::MouseScroll { .. }
        )
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(self, Self::KeyDown(_) | Self::KeyUp(_) | Self::Char(_))
    }
}
