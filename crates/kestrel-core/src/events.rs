//! Input event delivery.
//!
//! The windowing layer pushes [`InputEvent`]s through an [`EventSender`]
//! from whatever thread it runs on; the render thread drains the queue once
//! per frame and hands events to its listeners.

use std::sync::mpsc::{self, Receiver, Sender};

use kestrel_types::input::{InputEvent, Key, MouseButton};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: Sender<InputEvent>,
}

impl EventSender {
    /// Returns false once the queue has been dropped.
    pub fn send(&self, event: InputEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

#[derive(Debug)]
pub struct EventQueue {
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    pub fn push(&self, event: InputEvent) {
        // The queue owns a receiver, so sending cannot fail.
        let _ = self.sender.send(event);
    }

    /// Everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<InputEvent> {
        self.receiver.try_iter().collect()
    }

    /// Drain the queue into `listener`. Returns how many events were handled.
    pub fn dispatch(&self, listener: &mut dyn InputListener) -> usize {
        let events = self.drain();
        for event in &events {
            listener.on_event(event);
        }
        events.len()
    }
}

/// Receives drained events. Every method defaults to a no-op.
pub trait InputListener {
    fn on_mouse_down(&mut self, _x: f32, _y: f32, _button: MouseButton) {}
    fn on_mouse_up(&mut self, _x: f32, _y: f32, _button: MouseButton) {}
    fn on_mouse_move(&mut self, _x: f32, _y: f32) {}
    fn on_mouse_scroll(&mut self, _dx: f32, _dy: f32) {}
    fn on_key_down(&mut self, _key: Key) {}
    fn on_key_up(&mut self, _key: Key) {}
    fn on_char(&mut self, _c: char) {}
    fn on_touch(&mut self, _points: &[(f32, f32)]) {}
    fn on_resize(&mut self, _width: u32, _height: u32) {}
    fn on_focus(&mut self, _focused: bool) {}
    fn on_quit(&mut self) {}

    fn on_event(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::MouseDown { x, y, button } => self.on_mouse_down(x, y, button),
            InputEvent::MouseUp { x, y, button } => self.on_mouse_up(x, y, button),
            InputEvent::MouseMove { x, y } => self.on_mouse_move(x, y),
            InputEvent::MouseScroll { dx, dy } => self.on_mouse_scroll(dx, dy),
            InputEvent::KeyDown(key) => self.on_key_down(key),
            InputEvent::KeyUp(key) => self.on_key_up(key),
            InputEvent::Char(c) => self.on_char(c),
            InputEvent::Touch(ref points) => self.on_touch(points),
            InputEvent::Resized { width, height } => self.on_resize(width, height),
            InputEvent::Focus(focused) => self.on_focus(focused),
            InputEvent::Quit => self.on_quit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Tally {
        keys: Vec<Key>,
        resized: Option<(u32, u32)>,
        quit: bool,
    }

    impl InputListener for Tally {
        fn on_key_down(&mut self, key: Key) {
            self.keys.push(key);
        }
        fn on_resize(&mut self, width: u32, height: u32) {
            self.resized = Some((width, height));
        }
        fn on_quit(&mut self) {
            self.quit = true;
        }
    }

    #[test]
    fn drain_preserves_order() {
        let queue = EventQueue::new();
        queue.push(InputEvent::KeyDown(Key::Up));
        queue.push(InputEvent::KeyUp(Key::Up));
        assert_eq!(
            queue.drain(),
            vec![InputEvent::KeyDown(Key::Up), InputEvent::KeyUp(Key::Up)]
        );
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn sender_works_across_threads() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        std::thread::spawn(move || {
            assert!(sender.send(InputEvent::Focus(true)));
        })
        .join()
        .unwrap();
        assert_eq!(queue.drain(), vec![InputEvent::Focus(true)]);
    }

    #[test]
    fn dispatch_routes_to_listener() {
        let queue = EventQueue::new();
        queue.push(InputEvent::KeyDown(Key::Char('a')));
        queue.push(InputEvent::Resized {
            width: 640,
            height: 480,
        });
        queue.push(InputEvent::MouseMove { x: 1.0, y: 1.0 });
        queue.push(InputEvent::Quit);
        let mut tally = Tally::default();
        assert_eq!(queue.dispatch(&mut tally), 4);
        assert_eq!(tally.keys, vec![Key::Char('a')]);
        assert_eq!(tally.resized, Some((640, 480)));
        assert!(tally.quit);
    }

    #[test]
    fn send_after_drop_fails() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        drop(queue);
        assert!(!sender.send(InputEvent::Quit));
    }
}
