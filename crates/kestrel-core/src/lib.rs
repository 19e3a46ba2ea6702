//! Backend-agnostic rendering core for kestrel.
//!
//! [`RenderSystem`] owns a [`GraphicsBackend`], a texture registry and two
//! [`RenderState`] snapshots (desired and device). Draws reconcile the two
//! lazily, pushing only what changed, in a fixed order.

pub mod backend;
pub mod decoder;
pub mod device;
pub mod events;
pub mod idle;
pub mod logging;
pub mod render_state;
pub mod render_system;
pub mod shader;
pub mod texture;

pub use backend::{Caps, GraphicsBackend, NativeShaderId, NativeTextureId, WindowInfo};
pub use decoder::{ImageDecoder, PngDecoder, RawDecoder};
pub use device::DeviceState;
pub use events::{EventQueue, EventSender, InputListener};
pub use logging::{LoggingConfig, init_logging};
pub use render_state::RenderState;
pub use render_system::{RenderStats, RenderSystem};
pub use shader::{PixelShaderId, ShaderStage, VertexShaderId};
pub use texture::{Lock, Texture, TextureId, TextureMut, TextureOptions, TextureState};

pub use kestrel_types::{color, config, error, geometry, image, input, state, vertex};
