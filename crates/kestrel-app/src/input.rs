//! Input handling for the demo loop.

use kestrel_core::InputListener;
use kestrel_core::input::Key;

/// Collects the few events the demo reacts to.
#[derive(Debug, Default)]
pub struct DemoInput {
    pub quit: bool,
    pub resized: Option<(u32, u32)>,
    pub cursor: Option<(f32, f32)>,
}

impl InputListener for DemoInput {
    fn on_mouse_move(&mut self, x: f32, y: f32) {
        self.cursor = Some((x, y));
    }

    fn on_key_down(&mut self, key: Key) {
        if key == Key::Escape {
            self.quit = true;
        }
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.resized = Some((width, height));
    }

    fn on_quit(&mut self) {
        self.quit = true;
    }
}
