//! Shaders registered with a render system.
//!
//! Handles stay valid across device loss and destroy/create cycles: the
//! source is kept and compiled again whenever the device comes back.

use std::fmt;

use kestrel_types::error::Result;

use crate::backend::{GraphicsBackend, NativeShaderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexShaderId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PixelShaderId(pub u64);

impl fmt::Display for VertexShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vs#{}", self.0)
    }
}

impl fmt::Display for PixelShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ps#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

pub(crate) struct Shader {
    pub stage: ShaderStage,
    pub source: String,
    pub native: Option<NativeShaderId>,
}

impl Shader {
    pub fn new(stage: ShaderStage, source: &str) -> Self {
        Self {
            stage,
            source: source.to_string(),
            native: None,
        }
    }

    /// Compile the source unless a native shader already exists.
    pub fn compile(&mut self, backend: &mut dyn GraphicsBackend) -> Result<NativeShaderId> {
        if let Some(native) = self.native {
            return Ok(native);
        }
        let native = match self.stage {
            ShaderStage::Vertex => backend.create_vertex_shader(&self.source)?,
            ShaderStage::Pixel => backend.create_pixel_shader(&self.source)?,
        };
        self.native = Some(native);
        Ok(native)
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(native) = self.native.take() {
            backend.destroy_shader(native);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;

    #[test]
    fn compile_once_then_release() {
        let mut backend = RecordingBackend::new();
        let rec = backend.recording();
        let mut shader = Shader::new(ShaderStage::Pixel, "void main() {}");
        let first = shader.compile(&mut backend).unwrap();
        assert_eq!(shader.compile(&mut backend).unwrap(), first);
        assert_eq!(rec.borrow().counts.create_shader, 1);
        shader.release(&mut backend);
        assert_eq!(shader.native, None);
        assert_eq!(rec.borrow().live_shaders(), 0);
    }

    #[test]
    fn failed_compile_leaves_no_handle() {
        let mut backend = RecordingBackend::new();
        let mut shader = Shader::new(ShaderStage::Vertex, "");
        assert!(shader.compile(&mut backend).is_err());
        assert_eq!(shader.native, None);
    }
}
