//! SDL2 window with an OpenGL 3.3 core context for the GL backend.

use std::ffi::c_void;

use anyhow::{Result, anyhow};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::video::{GLContext, GLProfile, Window};

use kestrel_backend_gl::GlBackend;
use kestrel_core::EventSender;
use kestrel_core::config::WindowConfig;
use kestrel_core::input::{InputEvent, Key, MouseButton};

pub struct SdlHost {
    _sdl: sdl2::Sdl,
    video: sdl2::VideoSubsystem,
    window: Window,
    _context: GLContext,
    event_pump: sdl2::EventPump,
}

impl SdlHost {
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let sdl = sdl2::init().map_err(|e| anyhow!(e))?;
        let video = sdl.video().map_err(|e| anyhow!(e))?;
        let gl_attr = video.gl_attr();
        gl_attr.set_context_profile(GLProfile::Core);
        gl_attr.set_context_version(3, 3);

        let mut builder = video.window(&config.title, config.width, config.height);
        builder.opengl().position_centered();
        if config.fullscreen {
            builder.fullscreen();
        }
        let window = builder.build()?;
        let context = window.gl_create_context().map_err(|e| anyhow!(e))?;
        let event_pump = sdl.event_pump().map_err(|e| anyhow!(e))?;

        log::info!("SDL2 window created: {}x{}", config.width, config.height);
        Ok(Self {
            _sdl: sdl,
            video,
            window,
            _context: context,
            event_pump,
        })
    }

    /// GL backend bound to this window's context.
    pub fn backend(&self) -> GlBackend {
        GlBackend::new(|name| self.video.gl_get_proc_address(name) as *const c_void)
    }

    /// Forward pending window events into the queue.
    pub fn pump(&mut self, sender: &EventSender) {
        for event in self.event_pump.poll_iter() {
            if let Some(e) = map_sdl_event(event) {
                sender.send(e);
            }
        }
    }

    pub fn swap(&self) {
        self.window.gl_swap_window();
    }
}

fn map_sdl_event(event: Event) -> Option<InputEvent> {
    match event {
        Event::Quit { .. } => Some(InputEvent::Quit),
        Event::KeyDown {
            keycode: Some(key), ..
        } => Some(InputEvent::KeyDown(map_key(key))),
        Event::KeyUp {
            keycode: Some(key), ..
        } => Some(InputEvent::KeyUp(map_key(key))),
        Event::TextInput { text, .. } => text.chars().next().map(InputEvent::Char),
        Event::MouseMotion { x, y, .. } => Some(InputEvent::MouseMove {
            x: x as f32,
            y: y as f32,
        }),
        Event::MouseButtonDown {
            x, y, mouse_btn, ..
        } => Some(InputEvent::MouseDown {
            x: x as f32,
            y: y as f32,
            button: map_button(mouse_btn),
        }),
        Event::MouseButtonUp {
            x, y, mouse_btn, ..
        } => Some(InputEvent::MouseUp {
            x: x as f32,
            y: y as f32,
            button: map_button(mouse_btn),
        }),
        Event::MouseWheel { x, y, .. } => Some(InputEvent::MouseScroll {
            dx: x as f32,
            dy: y as f32,
        }),
        Event::Window { win_event, .. } => match win_event {
            WindowEvent::Resized(w, h) => Some(InputEvent::Resized {
                width: w.max(1) as u32,
                height: h.max(1) as u32,
            }),
            WindowEvent::FocusGained => Some(InputEvent::Focus(true)),
            WindowEvent::FocusLost => Some(InputEvent::Focus(false)),
            _ => None,
        },
        _ => None,
    }
}

fn map_button(button: sdl2::mouse::MouseButton) -> MouseButton {
    match button {
        sdl2::mouse::MouseButton::Left => MouseButton::Left,
        sdl2::mouse::MouseButton::Right => MouseButton::Right,
        sdl2::mouse::MouseButton::Middle => MouseButton::Middle,
        sdl2::mouse::MouseButton::X1 => MouseButton::Other(4),
        sdl2::mouse::MouseButton::X2 => MouseButton::Other(5),
        sdl2::mouse::MouseButton::Unknown => MouseButton::Other(0),
    }
}

fn map_key(key: Keycode) -> Key {
    match key {
        Keycode::Escape => Key::Escape,
        Keycode::Return => Key::Enter,
        Keycode::Backspace => Key::Backspace,
        Keycode::Tab => Key::Tab,
        Keycode::Space => Key::Space,
        Keycode::Left => Key::Left,
        Keycode::Right => Key::Right,
        Keycode::Up => Key::Up,
        Keycode::Down => Key::Down,
        Keycode::LShift | Keycode::RShift => Key::Shift,
        Keycode::LCtrl | Keycode::RCtrl => Key::Control,
        Keycode::LAlt | Keycode::RAlt => Key::Alt,
        Keycode::F1 => Key::F(1),
        Keycode::F2 => Key::F(2),
        Keycode::F3 => Key::F(3),
        Keycode::F4 => Key::F(4),
        other => {
            // Printable keys are named by their single character.
            let name = other.name();
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_graphic() => Key::Char(c.to_ascii_lowercase()),
                _ => Key::Unknown(0),
            }
        }
    }
}
