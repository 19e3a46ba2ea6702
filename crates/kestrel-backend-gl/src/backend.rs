//! [`GraphicsBackend`] on an OpenGL 3.3 core context.
//!
//! The backend does not own a window. The application creates the context,
//! makes it current on the render thread and swaps buffers after
//! [`GraphicsBackend::present`].

use std::collections::HashMap;
use std::ffi::c_void;

use gl::types::{GLenum, GLint, GLsizei, GLsizeiptr, GLuint};
use glam::Mat4;

use kestrel_core::backend::{
    Caps, GraphicsBackend, NativeShaderId, NativeTextureId, RenderOptions, TextureDesc,
    WindowInfo,
};
use kestrel_types::color::Color;
use kestrel_types::error::{KestrelError, Result};
use kestrel_types::geometry::PixelRect;
use kestrel_types::image::{self, Image, ImageFormat};
use kestrel_types::state::{
    AddressMode, BlendMode, ColorMode, RenderOp, TextureFilter, TextureType,
};
use kestrel_types::vertex::VertexStream;

use crate::convert;
use crate::shader::{self, Program};

struct GlTexture {
    name: GLuint,
    width: u32,
    height: u32,
    storage: ImageFormat,
    texture_type: TextureType,
    /// Framebuffer for render targets, created on first bind.
    fbo: GLuint,
}

const INITIAL_VBO_SIZE: usize = 64 * 1024;

pub struct GlBackend {
    /// Linked programs keyed by (vertex, fragment) shader name.
    programs: HashMap<(GLuint, GLuint), Program>,
    active: (GLuint, GLuint),
    builtin: (GLuint, GLuint),
    /// User shader objects and their stage.
    shaders: HashMap<GLuint, GLenum>,
    vertex_shader: Option<GLuint>,
    pixel_shader: Option<GLuint>,
    color_mode: (ColorMode, f32),
    system_color: Color,
    vao: GLuint,
    vbo: GLuint,
    vbo_size: usize,
    read_fbo: GLuint,
    textures: HashMap<GLuint, GlTexture>,
    size: (u32, u32),
    caps: Caps,
    depth_buffer: bool,
    target: Option<GLuint>,
    viewport: PixelRect,
    filter: TextureFilter,
    address_mode: AddressMode,
    bound: Option<GLuint>,
    modelview: Mat4,
    projection: Mat4,
    mvp_dirty: bool,
}

fn gl_error(context: &str) -> Result<()> {
    // SAFETY: GetError has no preconditions beyond a current context.
    let err = unsafe { gl::GetError() };
    if err == gl::NO_ERROR {
        return Ok(());
    }
    // Drain the rest so the next check starts clean.
    // SAFETY: as above.
    unsafe { while gl::GetError() != gl::NO_ERROR {} }
    Err(KestrelError::Backend(format!("{context}: GL error 0x{err:04x}")))
}

impl GlBackend {
    /// Load GL function pointers through `loader`, typically the windowing
    /// library's `get_proc_address`.
    pub fn new(mut loader: impl FnMut(&str) -> *const c_void) -> Self {
        gl::load_with(|s| loader(s));
        Self {
            programs: HashMap::new(),
            active: (0, 0),
            builtin: (0, 0),
            shaders: HashMap::new(),
            vertex_shader: None,
            pixel_shader: None,
            color_mode: (ColorMode::Multiply, 1.0),
            system_color: Color::WHITE,
            vao: 0,
            vbo: 0,
            vbo_size: 0,
            read_fbo: 0,
            textures: HashMap::new(),
            size: (0, 0),
            caps: Caps::default(),
            depth_buffer: false,
            target: None,
            viewport: PixelRect::default(),
            filter: TextureFilter::Linear,
            address_mode: AddressMode::Wrap,
            bound: None,
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            mvp_dirty: true,
        }
    }

    fn program(&self) -> Result<&Program> {
        self.programs
            .get(&self.active)
            .ok_or_else(|| KestrelError::Device("no GL device".into()))
    }

    fn ready(&self) -> bool {
        self.builtin.0 != 0
    }

    /// Make the program for the selected shader pair current and hand it the
    /// cached uniform values.
    fn use_program(&mut self) -> Result<()> {
        let key = (
            self.vertex_shader.unwrap_or(self.builtin.0),
            self.pixel_shader.unwrap_or(self.builtin.1),
        );
        if !self.programs.contains_key(&key) {
            let program = Program::link(key.0, key.1)?;
            log::debug!("linked program {} for shaders {key:?}", program.id);
            self.programs.insert(key, program);
        }
        self.active = key;
        let (mode, factor) = self.color_mode;
        let color = self.system_color;
        let program = self.program()?;
        // SAFETY: `program` is linked in the current context.
        unsafe {
            gl::UseProgram(program.id);
            gl::Uniform1i(program.texture, 0);
            gl::Uniform1i(program.color_mode, convert::color_mode(mode));
            gl::Uniform1f(program.lerp_factor, factor);
            gl::Uniform4f(program.system_color, color.r_f(), color.g_f(), color.b_f(), color.a_f());
        }
        self.mvp_dirty = true;
        Ok(())
    }

    /// Switch shader pair, keeping the previous one if linking fails.
    fn select_shaders(&mut self, vertex: Option<GLuint>, pixel: Option<GLuint>) {
        let previous = (self.vertex_shader, self.pixel_shader);
        (self.vertex_shader, self.pixel_shader) = (vertex, pixel);
        if let Err(e) = self.use_program() {
            log::error!("cannot use shaders {vertex:?}/{pixel:?}: {e}");
            (self.vertex_shader, self.pixel_shader) = previous;
            if let Err(e) = self.use_program() {
                log::error!("cannot restore previous program: {e}");
            }
        }
    }

    fn create_shader(&mut self, kind: GLenum, source: &str) -> Result<NativeShaderId> {
        if !self.ready() {
            return Err(KestrelError::Device("no GL device".into()));
        }
        let name = shader::compile(kind, source)?;
        self.shaders.insert(name, kind);
        Ok(NativeShaderId(u64::from(name)))
    }

    /// The user shader named by `id` if it exists for `kind`.
    fn user_shader(&self, id: NativeShaderId, kind: GLenum) -> Option<GLuint> {
        let name = id.0 as GLuint;
        (self.shaders.get(&name) == Some(&kind)).then_some(name)
    }

    fn create_resources(&mut self) -> Result<()> {
        let vert = shader::compile(gl::VERTEX_SHADER, shader::VERTEX_SHADER)?;
        let frag = match shader::compile(gl::FRAGMENT_SHADER, shader::FRAGMENT_SHADER) {
            Ok(frag) => frag,
            Err(e) => {
                shader::delete_shader(vert);
                return Err(e);
            }
        };
        self.builtin = (vert, frag);
        self.vertex_shader = None;
        self.pixel_shader = None;
        self.use_program()?;
        // SAFETY: object creation in the current context.
        unsafe {
            gl::GenVertexArrays(1, &mut self.vao);
            gl::GenBuffers(1, &mut self.vbo);
            gl::GenFramebuffers(1, &mut self.read_fbo);
            gl::BindVertexArray(self.vao);
            gl::BindBuffer(gl::ARRAY_BUFFER, self.vbo);
            gl::BufferData(
                gl::ARRAY_BUFFER,
                INITIAL_VBO_SIZE as GLsizeiptr,
                std::ptr::null(),
                gl::DYNAMIC_DRAW,
            );
            gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
            gl::PixelStorei(gl::PACK_ALIGNMENT, 1);
        }
        self.vbo_size = INITIAL_VBO_SIZE;
        self.mvp_dirty = true;
        gl_error("create resources")
    }

    fn delete_resources(&mut self) {
        for (_, texture) in self.textures.drain() {
            delete_texture(&texture);
        }
        for (_, mut program) in self.programs.drain() {
            program.delete();
        }
        for (name, _) in self.shaders.drain() {
            shader::delete_shader(name);
        }
        if self.ready() {
            shader::delete_shader(self.builtin.0);
            shader::delete_shader(self.builtin.1);
        }
        self.builtin = (0, 0);
        self.active = (0, 0);
        self.vertex_shader = None;
        self.pixel_shader = None;
        // SAFETY: deleting names this backend created; zero names are ignored.
        unsafe {
            if self.vbo != 0 {
                gl::DeleteBuffers(1, &self.vbo);
            }
            if self.vao != 0 {
                gl::DeleteVertexArrays(1, &self.vao);
            }
            if self.read_fbo != 0 {
                gl::DeleteFramebuffers(1, &self.read_fbo);
            }
        }
        self.vbo = 0;
        self.vao = 0;
        self.read_fbo = 0;
        self.vbo_size = 0;
        self.target = None;
        self.bound = None;
    }

    /// Whether draws go into a texture, whose rows are stored top first.
    fn flipped(&self) -> bool {
        self.target.is_some()
    }

    fn target_height(&self) -> u32 {
        self.target
            .and_then(|t| self.textures.get(&t))
            .map_or(self.size.1, |t| t.height)
    }

    /// Convert a top-left origin rect to GL window coordinates.
    fn gl_rect(&self, rect: PixelRect) -> (GLint, GLint, GLsizei, GLsizei) {
        let y = if self.flipped() {
            rect.y
        } else {
            self.target_height() as i32 - (rect.y + rect.h)
        };
        (rect.x, y, rect.w, rect.h)
    }

    fn apply_viewport(&self) {
        let (x, y, w, h) = self.gl_rect(self.viewport);
        // SAFETY: plain state call.
        unsafe { gl::Viewport(x, y, w, h) };
    }

    fn apply_sampling(&self) {
        let filter = convert::filter(self.filter);
        let address = convert::address(self.address_mode);
        // SAFETY: called with a texture bound to TEXTURE_2D on unit 0.
        unsafe {
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, filter);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, filter);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, address);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, address);
        }
    }

    fn upload_mvp(&mut self) -> Result<()> {
        if !self.mvp_dirty {
            return Ok(());
        }
        let flip = if self.flipped() {
            Mat4::from_scale(glam::Vec3::new(1.0, -1.0, 1.0))
        } else {
            Mat4::IDENTITY
        };
        let mvp = flip * self.projection * self.modelview;
        let loc = self.program()?.mvp;
        // SAFETY: program is in use; the array holds 16 floats.
        unsafe { gl::UniformMatrix4fv(loc, 1, gl::FALSE, mvp.to_cols_array().as_ptr()) };
        self.mvp_dirty = false;
        Ok(())
    }

    fn ensure_vbo(&mut self, bytes: usize) {
        if bytes <= self.vbo_size {
            return;
        }
        let mut size = self.vbo_size.max(INITIAL_VBO_SIZE);
        while size < bytes {
            size *= 2;
        }
        // SAFETY: vbo is bound to ARRAY_BUFFER.
        unsafe {
            gl::BufferData(gl::ARRAY_BUFFER, size as GLsizeiptr, std::ptr::null(), gl::DYNAMIC_DRAW);
        }
        log::debug!("vertex buffer grown to {size} bytes");
        self.vbo_size = size;
    }

    fn bind_attributes(vertices: &VertexStream<'_>) {
        let stride = vertices.stride() as GLsizei;
        let uv_offset: usize = if vertices.has_color() { 16 } else { 12 };
        // SAFETY: offsets lie within the vertex layout of `vertices`.
        unsafe {
            gl::EnableVertexAttribArray(0);
            gl::VertexAttribPointer(0, 3, gl::FLOAT, gl::FALSE, stride, std::ptr::null());
            if vertices.has_color() {
                gl::EnableVertexAttribArray(1);
                gl::VertexAttribPointer(
                    1,
                    4,
                    gl::UNSIGNED_BYTE,
                    gl::TRUE,
                    stride,
                    12usize as *const c_void,
                );
            } else {
                gl::DisableVertexAttribArray(1);
            }
            if vertices.has_uv() {
                gl::EnableVertexAttribArray(2);
                gl::VertexAttribPointer(
                    2,
                    2,
                    gl::FLOAT,
                    gl::FALSE,
                    stride,
                    uv_offset as *const c_void,
                );
            } else {
                gl::DisableVertexAttribArray(2);
            }
        }
    }

    fn texture(&self, id: NativeTextureId) -> Result<&GlTexture> {
        self.textures
            .get(&(id.0 as GLuint))
            .ok_or_else(|| KestrelError::Backend(format!("unknown texture {id:?}")))
    }

    fn restore_binding(&self) {
        // SAFETY: rebinding a live texture name or zero.
        unsafe { gl::BindTexture(gl::TEXTURE_2D, self.bound.unwrap_or(0)) };
    }
}

fn delete_texture(texture: &GlTexture) {
    // SAFETY: names created by this backend.
    unsafe {
        if texture.fbo != 0 {
            gl::DeleteFramebuffers(1, &texture.fbo);
        }
        gl::DeleteTextures(1, &texture.name);
    }
}

impl GraphicsBackend for GlBackend {
    fn name(&self) -> &str {
        "opengl"
    }

    fn caps(&self) -> Caps {
        self.caps
    }

    fn create_device(&mut self, window: &WindowInfo, options: &RenderOptions) -> Result<()> {
        if !gl::GetString::is_loaded() {
            return Err(KestrelError::Device("GL functions not loaded".into()));
        }
        let mut max: GLint = 0;
        // SAFETY: a context is current once function pointers resolved.
        unsafe { gl::GetIntegerv(gl::MAX_TEXTURE_SIZE, &mut max) };
        self.caps = Caps {
            max_texture_size: max.max(64) as u32,
            npot_textures: true,
            npot_textures_limited: false,
            triangle_fans: true,
            render_targets: true,
            shaders: true,
        };
        self.size = (window.width, window.height);
        self.depth_buffer = options.depth_buffer;
        self.viewport = PixelRect::full(window.width, window.height);
        self.create_resources()?;
        self.apply_viewport();
        log::info!(
            "OpenGL device created: {}x{}, max texture {}",
            window.width,
            window.height,
            self.caps.max_texture_size
        );
        Ok(())
    }

    fn destroy_device(&mut self) -> Result<()> {
        self.delete_resources();
        log::info!("OpenGL device destroyed");
        Ok(())
    }

    fn reset_device(&mut self) -> Result<()> {
        self.delete_resources();
        self.create_resources()?;
        self.apply_viewport();
        log::info!("OpenGL device reset");
        Ok(())
    }

    fn device_lost(&self) -> bool {
        if !gl::GetGraphicsResetStatus::is_loaded() {
            return false;
        }
        // SAFETY: entry point checked above.
        unsafe { gl::GetGraphicsResetStatus() != gl::NO_ERROR }
    }

    fn set_resolution(&mut self, width: u32, height: u32, _fullscreen: bool) -> Result<()> {
        // The swap chain belongs to the windowing layer; only track the size.
        self.size = (width, height);
        Ok(())
    }

    fn set_viewport(&mut self, rect: PixelRect) {
        self.viewport = rect;
        self.apply_viewport();
    }

    fn clear(&mut self, color: Option<Color>, depth: bool) {
        let mut mask: GLenum = 0;
        // SAFETY: plain state calls.
        unsafe {
            if let Some(c) = color {
                gl::ClearColor(c.r_f(), c.g_f(), c.b_f(), c.a_f());
                mask |= gl::COLOR_BUFFER_BIT;
            }
            if depth && self.depth_buffer {
                gl::DepthMask(gl::TRUE);
                gl::ClearDepth(1.0);
                mask |= gl::DEPTH_BUFFER_BIT;
            }
            if mask != 0 {
                gl::Clear(mask);
            }
        }
    }

    fn clear_rect(&mut self, rect: PixelRect, color: Color, depth: bool) {
        let (x, y, w, h) = self.gl_rect(rect);
        // SAFETY: plain state calls.
        unsafe {
            gl::Enable(gl::SCISSOR_TEST);
            gl::Scissor(x, y, w, h);
        }
        self.clear(Some(color), depth);
        // SAFETY: as above.
        unsafe { gl::Disable(gl::SCISSOR_TEST) };
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        // SAFETY: plain state calls.
        unsafe {
            match convert::blend(mode) {
                Some((equation, src, dst)) => {
                    gl::Enable(gl::BLEND);
                    gl::BlendEquation(equation);
                    gl::BlendFunc(src, dst);
                }
                None => gl::Disable(gl::BLEND),
            }
        }
    }

    fn set_color_mode(&mut self, mode: ColorMode, factor: f32) {
        self.color_mode = (mode, factor);
        let Ok(program) = self.program() else {
            return;
        };
        // SAFETY: program is in use.
        unsafe {
            gl::Uniform1i(program.color_mode, convert::color_mode(mode));
            gl::Uniform1f(program.lerp_factor, factor);
        }
    }

    fn set_texture_filter(&mut self, filter: TextureFilter) {
        self.filter = filter;
        if self.bound.is_some() {
            self.apply_sampling();
        }
    }

    fn set_texture_address_mode(&mut self, mode: AddressMode) {
        self.address_mode = mode;
        if self.bound.is_some() {
            self.apply_sampling();
        }
    }

    fn set_depth_buffer(&mut self, enabled: bool, write: bool) {
        // SAFETY: plain state calls.
        unsafe {
            if enabled {
                gl::Enable(gl::DEPTH_TEST);
                gl::DepthFunc(gl::LEQUAL);
            } else {
                gl::Disable(gl::DEPTH_TEST);
            }
            gl::DepthMask(if write { gl::TRUE } else { gl::FALSE });
        }
    }

    fn set_system_color(&mut self, color: Color) {
        self.system_color = color;
        let Ok(program) = self.program() else {
            return;
        };
        // SAFETY: program is in use.
        unsafe {
            gl::Uniform4f(program.system_color, color.r_f(), color.g_f(), color.b_f(), color.a_f());
        }
    }

    fn bind_texture(&mut self, id: Option<NativeTextureId>) {
        self.bound = id.map(|id| id.0 as GLuint);
        self.restore_binding();
        if self.bound.is_some() {
            self.apply_sampling();
        }
    }

    fn set_modelview_matrix(&mut self, matrix: &Mat4) {
        self.modelview = *matrix;
        self.mvp_dirty = true;
    }

    fn set_projection_matrix(&mut self, matrix: &Mat4) {
        self.projection = *matrix;
        self.mvp_dirty = true;
    }

    fn set_render_target(&mut self, target: Option<NativeTextureId>) -> Result<()> {
        let Some(id) = target else {
            // SAFETY: binding the default framebuffer.
            unsafe { gl::BindFramebuffer(gl::FRAMEBUFFER, 0) };
            self.target = None;
            self.mvp_dirty = true;
            self.apply_viewport();
            return Ok(());
        };
        let name = id.0 as GLuint;
        let texture = self
            .textures
            .get_mut(&name)
            .ok_or_else(|| KestrelError::Backend(format!("unknown render target {id:?}")))?;
        if texture.texture_type != TextureType::RenderTarget {
            return Err(KestrelError::Backend(format!(
                "texture {id:?} is not a render target"
            )));
        }
        // SAFETY: framebuffer objects for a live texture.
        unsafe {
            if texture.fbo == 0 {
                gl::GenFramebuffers(1, &mut texture.fbo);
                gl::BindFramebuffer(gl::FRAMEBUFFER, texture.fbo);
                gl::FramebufferTexture2D(
                    gl::FRAMEBUFFER,
                    gl::COLOR_ATTACHMENT0,
                    gl::TEXTURE_2D,
                    name,
                    0,
                );
                let status = gl::CheckFramebufferStatus(gl::FRAMEBUFFER);
                if status != gl::FRAMEBUFFER_COMPLETE {
                    gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
                    return Err(KestrelError::Backend(format!(
                        "render target {id:?} incomplete: 0x{status:04x}"
                    )));
                }
            } else {
                gl::BindFramebuffer(gl::FRAMEBUFFER, texture.fbo);
            }
        }
        self.target = Some(name);
        self.mvp_dirty = true;
        self.apply_viewport();
        Ok(())
    }

    fn draw(&mut self, op: RenderOp, vertices: VertexStream<'_>) -> Result<()> {
        let textured = vertices.has_uv() && self.bound.is_some();
        let (vertex_color, textured_flag) = {
            let program = self.program()?;
            (program.vertex_color, program.textured)
        };
        self.upload_mvp()?;
        let bytes = vertices.as_bytes();
        // SAFETY: vao/vbo are live; `bytes` fits the buffer after `ensure_vbo`.
        unsafe {
            gl::BindVertexArray(self.vao);
            gl::BindBuffer(gl::ARRAY_BUFFER, self.vbo);
        }
        self.ensure_vbo(bytes.len());
        // SAFETY: the buffer holds at least `bytes.len()` bytes.
        unsafe {
            gl::BufferSubData(
                gl::ARRAY_BUFFER,
                0,
                bytes.len() as GLsizeiptr,
                bytes.as_ptr() as *const c_void,
            );
            Self::bind_attributes(&vertices);
            gl::Uniform1i(vertex_color, vertices.has_color() as GLint);
            gl::Uniform1i(textured_flag, textured as GLint);
            gl::DrawArrays(convert::primitive(op), 0, vertices.len() as GLsizei);
        }
        gl_error("draw")
    }

    fn present(&mut self) -> Result<()> {
        // SAFETY: plain call.
        unsafe { gl::Flush() };
        gl_error("present")
    }

    fn take_screenshot(&mut self, format: ImageFormat) -> Result<Image> {
        let (w, h) = self.size;
        let mut data = vec![0u8; w as usize * h as usize * 4];
        // SAFETY: `data` holds w * h RGBA pixels; PACK_ALIGNMENT is 1.
        unsafe {
            gl::BindFramebuffer(gl::READ_FRAMEBUFFER, 0);
            gl::ReadPixels(
                0,
                0,
                w as GLsizei,
                h as GLsizei,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                data.as_mut_ptr() as *mut c_void,
            );
        }
        gl_error("screenshot")?;
        convert::flip_rows(&mut data, w as usize * 4);
        Ok(Image::new(w, h, ImageFormat::Rgba, data)?.convert(format))
    }

    fn native_texture_format(&self, format: ImageFormat) -> ImageFormat {
        convert::storage_format(format)
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<NativeTextureId> {
        let max = self.caps.max_texture_size;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(KestrelError::Backend(format!(
                "unsupported texture size {}x{} (max {max})",
                desc.width, desc.height
            )));
        }
        let storage = convert::storage_format(desc.format);
        let mut name: GLuint = 0;
        // SAFETY: allocating storage for a fresh texture name.
        unsafe {
            gl::GenTextures(1, &mut name);
            gl::BindTexture(gl::TEXTURE_2D, name);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAX_LEVEL, 0);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                gl::RGBA8 as GLint,
                desc.width as GLsizei,
                desc.height as GLsizei,
                0,
                convert::pixel_format(storage),
                gl::UNSIGNED_BYTE,
                std::ptr::null(),
            );
        }
        self.apply_sampling();
        self.restore_binding();
        if let Err(e) = gl_error("create texture") {
            // SAFETY: `name` was generated above.
            unsafe { gl::DeleteTextures(1, &name) };
            return Err(e);
        }
        self.textures.insert(
            name,
            GlTexture {
                name,
                width: desc.width,
                height: desc.height,
                storage,
                texture_type: desc.texture_type,
                fbo: 0,
            },
        );
        Ok(NativeTextureId(name as u64))
    }

    fn destroy_texture(&mut self, id: NativeTextureId) {
        let name = id.0 as GLuint;
        if self.target == Some(name) {
            // SAFETY: binding the default framebuffer.
            unsafe { gl::BindFramebuffer(gl::FRAMEBUFFER, 0) };
            self.target = None;
            self.mvp_dirty = true;
        }
        if self.bound == Some(name) {
            self.bound = None;
        }
        if let Some(texture) = self.textures.remove(&name) {
            delete_texture(&texture);
        }
    }

    fn upload_texture(
        &mut self,
        id: NativeTextureId,
        rect: PixelRect,
        data: &[u8],
        format: ImageFormat,
    ) -> Result<()> {
        let texture = self.texture(id)?;
        if rect.clip_to(texture.width, texture.height) != Some(rect) {
            return Err(KestrelError::Backend(format!(
                "upload rect {rect:?} out of bounds"
            )));
        }
        let pixels = image::convert_pixels(data, format, texture.storage);
        if pixels.len() != rect.area() * texture.storage.bpp() {
            return Err(KestrelError::Backend(format!(
                "upload of {rect:?} needs {} bytes, got {}",
                rect.area() * format.bpp(),
                data.len()
            )));
        }
        // SAFETY: `pixels` holds exactly `rect` in the storage layout.
        unsafe {
            gl::BindTexture(gl::TEXTURE_2D, texture.name);
            gl::TexSubImage2D(
                gl::TEXTURE_2D,
                0,
                rect.x,
                rect.y,
                rect.w,
                rect.h,
                convert::pixel_format(texture.storage),
                gl::UNSIGNED_BYTE,
                pixels.as_ptr() as *const c_void,
            );
        }
        self.restore_binding();
        gl_error("upload texture")
    }

    fn read_texture(&mut self, id: NativeTextureId, rect: PixelRect) -> Result<Vec<u8>> {
        let texture = self.texture(id)?;
        if rect.clip_to(texture.width, texture.height) != Some(rect) {
            return Err(KestrelError::Backend(format!(
                "read rect {rect:?} out of bounds"
            )));
        }
        let mut out = vec![0u8; rect.area() * texture.storage.bpp()];
        let fbo = self.read_fbo;
        // SAFETY: `out` holds `rect` in the storage layout; the draw
        // framebuffer binding is left untouched.
        unsafe {
            gl::BindFramebuffer(gl::READ_FRAMEBUFFER, fbo);
            gl::FramebufferTexture2D(
                gl::READ_FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0,
                gl::TEXTURE_2D,
                texture.name,
                0,
            );
            gl::ReadPixels(
                rect.x,
                rect.y,
                rect.w,
                rect.h,
                convert::pixel_format(texture.storage),
                gl::UNSIGNED_BYTE,
                out.as_mut_ptr() as *mut c_void,
            );
            gl::FramebufferTexture2D(gl::READ_FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, 0, 0);
            gl::BindFramebuffer(gl::READ_FRAMEBUFFER, 0);
        }
        gl_error("read texture")?;
        Ok(out)
    }

    fn create_vertex_shader(&mut self, source: &str) -> Result<NativeShaderId> {
        self.create_shader(gl::VERTEX_SHADER, source)
    }

    fn create_pixel_shader(&mut self, source: &str) -> Result<NativeShaderId> {
        self.create_shader(gl::FRAGMENT_SHADER, source)
    }

    fn destroy_shader(&mut self, id: NativeShaderId) {
        let name = id.0 as GLuint;
        if self.shaders.remove(&name).is_none() {
            log::warn!("cannot destroy unknown shader {id:?}");
            return;
        }
        if self.vertex_shader == Some(name) || self.pixel_shader == Some(name) {
            let vertex = self.vertex_shader.filter(|&n| n != name);
            let pixel = self.pixel_shader.filter(|&n| n != name);
            self.select_shaders(vertex, pixel);
        }
        let stale: Vec<(GLuint, GLuint)> = self
            .programs
            .keys()
            .filter(|(v, f)| *v == name || *f == name)
            .copied()
            .collect();
        for key in stale {
            if let Some(mut program) = self.programs.remove(&key) {
                program.delete();
            }
        }
        shader::delete_shader(name);
    }

    fn set_vertex_shader(&mut self, id: Option<NativeShaderId>) {
        if !self.ready() {
            return;
        }
        let name = match id {
            None => None,
            Some(id) => match self.user_shader(id, gl::VERTEX_SHADER) {
                Some(name) => Some(name),
                None => {
                    log::warn!("unknown vertex shader {id:?}");
                    return;
                }
            },
        };
        self.select_shaders(name, self.pixel_shader);
    }

    fn set_pixel_shader(&mut self, id: Option<NativeShaderId>) {
        if !self.ready() {
            return;
        }
        let name = match id {
            None => None,
            Some(id) => match self.user_shader(id, gl::FRAGMENT_SHADER) {
                Some(name) => Some(name),
                None => {
                    log::warn!("unknown pixel shader {id:?}");
                    return;
                }
            },
        };
        self.select_shaders(self.vertex_shader, name);
    }
}

impl Drop for GlBackend {
    fn drop(&mut self) {
        if self.ready() {
            self.delete_resources();
        }
    }
}
