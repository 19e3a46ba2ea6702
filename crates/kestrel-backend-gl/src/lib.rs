//! OpenGL 3.3 core backend for kestrel.
//!
//! A built-in shader program covers every render state: the color mode, the
//! system color and whether a texture is sampled are uniforms, blending and
//! depth are fixed-function state. User shaders replace a single stage and
//! are linked with the other built-in stage into a cached program.
//! Vertices stream through a single dynamic buffer that grows on demand.

mod backend;
mod convert;
mod shader;

pub use backend::GlBackend;
