//! Shader registration and selection.

use kestrel_types::error::{KestrelError, Result};

use super::RenderSystem;
use crate::backend::NativeShaderId;
use crate::shader::{PixelShaderId, Shader, ShaderStage, VertexShaderId};

impl RenderSystem {
    /// Compile a vertex shader from backend-specific source.
    pub fn create_vertex_shader(&mut self, source: &str) -> Result<VertexShaderId> {
        self.add_shader(ShaderStage::Vertex, source).map(VertexShaderId)
    }

    /// Compile a pixel shader from backend-specific source.
    pub fn create_pixel_shader(&mut self, source: &str) -> Result<PixelShaderId> {
        self.add_shader(ShaderStage::Pixel, source).map(PixelShaderId)
    }

    fn add_shader(&mut self, stage: ShaderStage, source: &str) -> Result<u64> {
        self.require_device()?;
        if !self.caps.shaders {
            return Err(KestrelError::Backend(format!(
                "{} does not support shaders",
                self.backend.name()
            )));
        }
        let mut shader = Shader::new(stage, source);
        shader.compile(self.backend.as_mut())?;
        let id = self.next_shader_id;
        self.next_shader_id += 1;
        self.shaders.insert(id, shader);
        log::debug!("created {stage:?} shader {id}");
        Ok(id)
    }

    pub fn destroy_vertex_shader(&mut self, id: VertexShaderId) {
        if self.active_vertex_shader == Some(id) {
            self.active_vertex_shader = None;
        }
        self.remove_shader(id.0, ShaderStage::Vertex);
    }

    pub fn destroy_pixel_shader(&mut self, id: PixelShaderId) {
        if self.active_pixel_shader == Some(id) {
            self.active_pixel_shader = None;
        }
        self.remove_shader(id.0, ShaderStage::Pixel);
    }

    fn remove_shader(&mut self, id: u64, stage: ShaderStage) {
        if !self.has_shader(id, stage) {
            log::warn!("cannot destroy unknown {stage:?} shader {id}");
            return;
        }
        let Some(mut shader) = self.shaders.remove(&id) else {
            return;
        };
        if !self.device.is_ready() {
            return;
        }
        // The backend may hand the same native id out again.
        if let Some(native) = shader.native {
            if self.device_state.vertex_shader == Some(native) {
                self.backend.set_vertex_shader(None);
                self.device_state.vertex_shader = None;
            }
            if self.device_state.pixel_shader == Some(native) {
                self.backend.set_pixel_shader(None);
                self.device_state.pixel_shader = None;
            }
        }
        shader.release(self.backend.as_mut());
        log::debug!("destroyed {stage:?} shader {id}");
    }

    /// Select the vertex shader for the next draws. `None` or an unknown id
    /// selects the built-in one.
    pub fn set_vertex_shader(&mut self, id: Option<VertexShaderId>) {
        if let Some(id) = id
            && !self.has_shader(id.0, ShaderStage::Vertex)
        {
            log::warn!("cannot select unknown vertex shader {id}");
            self.active_vertex_shader = None;
            return;
        }
        self.active_vertex_shader = id;
    }

    /// Select the pixel shader for the next draws. `None` or an unknown id
    /// selects the built-in one.
    pub fn set_pixel_shader(&mut self, id: Option<PixelShaderId>) {
        if let Some(id) = id
            && !self.has_shader(id.0, ShaderStage::Pixel)
        {
            log::warn!("cannot select unknown pixel shader {id}");
            self.active_pixel_shader = None;
            return;
        }
        self.active_pixel_shader = id;
    }

    pub fn vertex_shader(&self) -> Option<VertexShaderId> {
        self.active_vertex_shader
    }

    pub fn pixel_shader(&self) -> Option<PixelShaderId> {
        self.active_pixel_shader
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    fn has_shader(&self, id: u64, stage: ShaderStage) -> bool {
        self.shaders.get(&id).is_some_and(|s| s.stage == stage)
    }

    /// Native handles of the selected shaders, for the next reconcile.
    pub(super) fn active_native_shaders(
        &self,
    ) -> (Option<NativeShaderId>, Option<NativeShaderId>) {
        let native = |id: Option<u64>| {
            id.and_then(|id| self.shaders.get(&id))
                .and_then(|s| s.native)
        };
        (
            native(self.active_vertex_shader.map(|id| id.0)),
            native(self.active_pixel_shader.map(|id| id.0)),
        )
    }

    /// Compile every shader that lost its native handle. Failures fall back
    /// to the built-in shader.
    pub(super) fn compile_shaders(&mut self) {
        let mut ids: Vec<u64> = self.shaders.keys().copied().collect();
        ids.sort();
        for id in ids {
            if let Some(shader) = self.shaders.get_mut(&id)
                && let Err(e) = shader.compile(self.backend.as_mut())
            {
                log::warn!("could not compile {:?} shader {id}: {e}", shader.stage);
            }
        }
    }

    /// Destroy native shaders while the device is still usable.
    pub(super) fn release_shaders(&mut self) {
        for shader in self.shaders.values_mut() {
            shader.release(self.backend.as_mut());
        }
    }

    /// Drop native handles the device has already discarded.
    pub(super) fn forget_shaders(&mut self) {
        for shader in self.shaders.values_mut() {
            shader.native = None;
        }
    }
}
