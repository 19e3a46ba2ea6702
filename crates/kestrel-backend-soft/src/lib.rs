//! Software rendering backend for kestrel.
//!
//! Rasterizes into an in-memory RGBA back buffer, so the full render system
//! can run headless: in tests, in CI and for offline screenshots. Textures
//! are stored as RGBA8 regardless of the requested format.

mod backend;
pub mod raster;
pub mod sampler;
pub mod shade;
pub mod surface;

pub use backend::{DeviceLossTrigger, SoftwareBackend};
