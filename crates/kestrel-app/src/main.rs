//! kestrel demo entry point.
//!
//! Renders an animated scene and saves the last frame as a PNG. The
//! software backend runs headless for a fixed number of frames; with the
//! `sdl` feature the OpenGL backend opens a window and runs until it is
//! closed or Escape is pressed.
//!
//! Usage:
//!   cargo run -p kestrel-app -- [config.toml] [output.png]
//!   cargo run -p kestrel-app --features sdl -- kestrel.toml

mod input;
mod scene;
mod screenshot;
#[cfg(feature = "sdl")]
mod window;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use input::DemoInput;
use kestrel_backend_soft::SoftwareBackend;
use kestrel_core::config::{BackendKind, RenderConfig};
use kestrel_core::image::ImageFormat;
use kestrel_core::input::InputEvent;
use kestrel_core::{
    EventQueue, EventSender, GraphicsBackend, LoggingConfig, RenderSystem, WindowInfo,
    init_logging,
};
use scene::Scene;

/// Frames rendered by the headless run.
const HEADLESS_FRAMES: u32 = 4;
const FRAME_TIME: f32 = 1.0 / 60.0;

/// Where frames end up and where input comes from.
enum Host {
    Headless,
    #[cfg(feature = "sdl")]
    Sdl(window::SdlHost),
}

impl Host {
    fn pump(&mut self, _sender: &EventSender) {
        #[cfg(feature = "sdl")]
        if let Host::Sdl(host) = self {
            host.pump(_sender);
        }
    }

    fn swap(&self) {
        #[cfg(feature = "sdl")]
        if let Host::Sdl(host) = self {
            host.swap();
        }
    }

    fn frame_limit(&self) -> Option<u32> {
        match self {
            Host::Headless => Some(HEADLESS_FRAMES),
            #[cfg(feature = "sdl")]
            Host::Sdl(_) => None,
        }
    }
}

fn open_backend(config: &RenderConfig) -> Result<(Host, Box<dyn GraphicsBackend>)> {
    match config.backend {
        BackendKind::Software => Ok((Host::Headless, Box::new(SoftwareBackend::new()))),
        #[cfg(feature = "sdl")]
        BackendKind::OpenGl => {
            let host = window::SdlHost::new(&config.window)?;
            let backend = host.backend();
            Ok((Host::Sdl(host), Box::new(backend)))
        }
        #[cfg(not(feature = "sdl"))]
        BackendKind::OpenGl => anyhow::bail!(
            "the OpenGL backend needs a window; rebuild with `--features sdl` \
             or set backend = \"software\""
        ),
    }
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => RenderConfig::load(Path::new(&path))
            .with_context(|| format!("loading config {path}"))?,
        None => RenderConfig::default(),
    };
    let output = PathBuf::from(args.next().unwrap_or_else(|| "kestrel-demo.png".to_string()));

    init_logging(&LoggingConfig::from(&config.logging));
    log::info!(
        "Starting {} ({}x{}, {:?} backend)",
        config.window.title,
        config.window.width,
        config.window.height,
        config.backend,
    );

    let (mut host, backend) = open_backend(&config)?;
    let window = WindowInfo {
        fullscreen: config.window.fullscreen,
        ..WindowInfo::new(config.window.width, config.window.height)
    };
    let mut rs = RenderSystem::new(backend, config);
    rs.create(&window)?;
    log::info!("system: {}", serde_json::to_string(&rs.system_info())?);
    log::debug!("display modes: {:?}", rs.supported_display_modes());

    let queue = EventQueue::new();
    let sender = queue.sender();
    sender.send(InputEvent::Focus(true));

    let scene = Scene::build(&mut rs)?;
    let mut input = DemoInput::default();
    let limit = host.frame_limit();
    let mut frame = 0;
    let shot = loop {
        host.pump(&sender);
        queue.dispatch(&mut input);
        if let Some((width, height)) = input.resized.take() {
            rs.set_resolution(width, height, rs.window().fullscreen)?;
        }

        scene.draw(&mut rs, frame)?;
        rs.update(FRAME_TIME);
        frame += 1;

        let last = input.quit || limit.is_some_and(|n| frame >= n);
        let shot = if last {
            Some(rs.take_screenshot(ImageFormat::Rgba)?)
        } else {
            None
        };
        rs.present_frame()?;
        host.swap();
        log::debug!("frame {frame}: {:?}", rs.last_frame_stats());
        if let Some(shot) = shot {
            break shot;
        }
    };
    log::debug!("last cursor position: {:?}", input.cursor);

    screenshot::save_png(&output, shot)
        .with_context(|| format!("writing {}", output.display()))?;
    log::info!(
        "Saved {} after {frame} frames ({} textures, {} bytes VRAM)",
        output.display(),
        rs.texture_count(),
        rs.vram_consumption()
    );

    rs.destroy()?;
    Ok(())
}
