//! Shader compilation and program linking.
//!
//! The built-in pair implements every color mode through uniforms. User
//! shaders replace one stage and are linked against the other stage's
//! built-in on demand.

use std::ffi::CString;

use gl::types::{GLchar, GLenum, GLint, GLuint};

use kestrel_types::error::{KestrelError, Result};

pub const VERTEX_SHADER: &str = r#"#version 330 core
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec4 a_color;
layout(location = 2) in vec2 a_uv;

uniform mat4 u_mvp;
uniform bool u_vertex_color;
uniform vec4 u_system_color;

out vec4 v_color;
out vec2 v_uv;

void main() {
    v_color = u_vertex_color ? a_color : u_system_color;
    v_uv = a_uv;
    gl_Position = u_mvp * vec4(a_position, 1.0);
}
"#;

pub const FRAGMENT_SHADER: &str = r#"#version 330 core
in vec4 v_color;
in vec2 v_uv;

uniform sampler2D u_texture;
uniform bool u_textured;
uniform int u_color_mode;
uniform float u_lerp_factor;

out vec4 o_color;

void main() {
    if (!u_textured) {
        o_color = v_color;
        return;
    }
    vec4 t = texture(u_texture, v_uv);
    if (u_color_mode == 1) {
        o_color = vec4(v_color.rgb, t.a * v_color.a);
    } else if (u_color_mode == 2) {
        o_color = vec4(mix(t.rgb, v_color.rgb, u_lerp_factor), t.a * v_color.a);
    } else {
        o_color = t * v_color;
    }
}
"#;

/// Linked program with its uniform locations.
pub struct Program {
    pub id: GLuint,
    pub mvp: GLint,
    pub vertex_color: GLint,
    pub system_color: GLint,
    pub texture: GLint,
    pub textured: GLint,
    pub color_mode: GLint,
    pub lerp_factor: GLint,
}

fn info_log(id: GLuint, shader: bool) -> String {
    let mut len: GLint = 0;
    // SAFETY: `id` names a live shader or program in the current context.
    unsafe {
        if shader {
            gl::GetShaderiv(id, gl::INFO_LOG_LENGTH, &mut len);
        } else {
            gl::GetProgramiv(id, gl::INFO_LOG_LENGTH, &mut len);
        }
    }
    let mut buf = vec![0u8; len.max(1) as usize];
    let mut written: GLint = 0;
    // SAFETY: `buf` holds `len` bytes.
    unsafe {
        if shader {
            gl::GetShaderInfoLog(id, len, &mut written, buf.as_mut_ptr() as *mut GLchar);
        } else {
            gl::GetProgramInfoLog(id, len, &mut written, buf.as_mut_ptr() as *mut GLchar);
        }
    }
    buf.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn compile(kind: GLenum, source: &str) -> Result<GLuint> {
    let src = CString::new(source)
        .map_err(|_| KestrelError::Backend("shader source contains NUL".into()))?;
    // SAFETY: plain GL object creation with a NUL-terminated source.
    unsafe {
        let shader = gl::CreateShader(kind);
        gl::ShaderSource(shader, 1, &src.as_ptr(), std::ptr::null());
        gl::CompileShader(shader);
        let mut ok: GLint = 0;
        gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut ok);
        if ok == 0 {
            let log = info_log(shader, true);
            gl::DeleteShader(shader);
            return Err(KestrelError::Backend(format!("shader compile failed: {log}")));
        }
        Ok(shader)
    }
}

fn uniform(program: GLuint, name: &str) -> GLint {
    let Ok(c) = CString::new(name) else {
        return -1;
    };
    // SAFETY: `program` is linked and `c` is NUL-terminated.
    let loc = unsafe { gl::GetUniformLocation(program, c.as_ptr()) };
    if loc < 0 {
        log::debug!("uniform {name} not used by program {program}");
    }
    loc
}

pub fn delete_shader(shader: GLuint) {
    // SAFETY: `shader` names a shader object created by `compile`.
    unsafe { gl::DeleteShader(shader) };
}

impl Program {
    /// Link `vert` and `frag`, leaving both shader objects alive.
    pub fn link(vert: GLuint, frag: GLuint) -> Result<Self> {
        // SAFETY: both shaders compiled in the current context.
        let id = unsafe {
            let id = gl::CreateProgram();
            gl::AttachShader(id, vert);
            gl::AttachShader(id, frag);
            gl::LinkProgram(id);
            gl::DetachShader(id, vert);
            gl::DetachShader(id, frag);
            let mut ok: GLint = 0;
            gl::GetProgramiv(id, gl::LINK_STATUS, &mut ok);
            if ok == 0 {
                let log = info_log(id, false);
                gl::DeleteProgram(id);
                return Err(KestrelError::Backend(format!("program link failed: {log}")));
            }
            id
        };
        Ok(Self {
            id,
            mvp: uniform(id, "u_mvp"),
            vertex_color: uniform(id, "u_vertex_color"),
            system_color: uniform(id, "u_system_color"),
            texture: uniform(id, "u_texture"),
            textured: uniform(id, "u_textured"),
            color_mode: uniform(id, "u_color_mode"),
            lerp_factor: uniform(id, "u_lerp_factor"),
        })
    }

    pub fn delete(&mut self) {
        if self.id != 0 {
            // SAFETY: `id` names a program created by `link`.
            unsafe { gl::DeleteProgram(self.id) };
            self.id = 0;
        }
    }
}
