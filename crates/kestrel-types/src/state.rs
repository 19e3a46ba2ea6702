//! Render-state and texture enums shared by the core and every backend.
//!
//! The `Undefined` variants are sentinels: they mark a cache slot whose
//! device value is unknown and are never pushed to a backend.

use serde::{Deserialize, Serialize};

/// Framebuffer blending equation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// src-alpha, inv-src-alpha.
    #[default]
    Alpha,
    /// src-alpha, one.
    Add,
    /// Reverse subtract with src-alpha, one.
    Subtract,
    /// one, zero; blending disabled.
    Overwrite,
    Undefined,
}

impl BlendMode {
    pub fn is_defined(self) -> bool {
        self != Self::Undefined
    }
}

/// How texture color combines with the vertex (diffuse) color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// texture * diffuse.
    #[default]
    Multiply,
    /// Diffuse color with alpha taken from texture alpha * diffuse alpha.
    AlphaMap,
    /// Interpolate texture toward diffuse by the color mode factor.
    Lerp,
    Undefined,
}

impl ColorMode {
    pub fn is_defined(self) -> bool {
        self != Self::Undefined
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
    Undefined,
}

impl TextureFilter {
    pub fn is_defined(self) -> bool {
        self != Self::Undefined
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressMode {
    #[default]
    Wrap,
    Clamp,
    Undefined,
}

impl AddressMode {
    pub fn is_defined(self) -> bool {
        self != Self::Undefined
    }
}

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderOp {
    TriangleList,
    TriangleStrip,
    TriangleFan,
    LineList,
    LineStrip,
    PointList,
}

impl RenderOp {
    pub const ALL: [RenderOp; 6] = [
        RenderOp::TriangleList,
        RenderOp::TriangleStrip,
        RenderOp::TriangleFan,
        RenderOp::LineList,
        RenderOp::LineStrip,
        RenderOp::PointList,
    ];

    pub fn is_triangles(self) -> bool {
        matches!(
            self,
            Self::TriangleList | Self::TriangleStrip | Self::TriangleFan
        )
    }

    pub fn is_lines(self) -> bool {
        matches!(self, Self::LineList | Self::LineStrip)
    }
}

/// Residency policy of a texture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureType {
    /// Keeps a CPU copy; restored automatically after device loss.
    #[default]
    Managed,
    /// Not edited after creation. File-backed ones drop their CPU copy after
    /// upload and reload from the file; ones made from pixel data keep it.
    Immutable,
    /// No CPU copy; lost on device loss.
    Volatile,
    /// Can be bound as a render target.
    RenderTarget,
}

impl TextureType {
    /// Whether pixel data stays in RAM after GPU upload. `from_file` is true
    /// when the pixels can be decoded again from their source file.
    pub fn keeps_cpu_copy(self, from_file: bool) -> bool {
        match self {
            Self::Managed | Self::RenderTarget => true,
            Self::Immutable => !from_file,
            Self::Volatile => false,
        }
    }
}

/// When a texture's pixels are decoded and uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Load synchronously at creation.
    #[default]
    Immediate,
    /// Load synchronously on first use.
    OnDemand,
    /// Decode on a worker at creation; upload at the next frame.
    Async,
    /// Decode on a worker at creation; upload on first use.
    AsyncOnDemand,
}

impl LoadMode {
    pub fn is_async(self) -> bool {
        matches!(self, Self::Async | Self::AsyncOnDemand)
    }

    pub fn is_on_demand(self) -> bool {
        matches!(self, Self::OnDemand | Self::AsyncOnDemand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(BlendMode::default(), BlendMode::Alpha);
        assert_eq!(ColorMode::default(), ColorMode::Multiply);
        assert_eq!(TextureFilter::default(), TextureFilter::Linear);
        assert_eq!(AddressMode::default(), AddressMode::Wrap);
        assert_eq!(TextureType::default(), TextureType::Managed);
        assert_eq!(LoadMode::default(), LoadMode::Immediate);
    }

    #[test]
    fn undefined_is_not_defined() {
        assert!(!BlendMode::Undefined.is_defined());
        assert!(!ColorMode::Undefined.is_defined());
        assert!(!TextureFilter::Undefined.is_defined());
        assert!(!AddressMode::Undefined.is_defined());
        assert!(BlendMode::Overwrite.is_defined());
    }

    #[test]
    fn cpu_copy_policy() {
        assert!(TextureType::Managed.keeps_cpu_copy(true));
        assert!(TextureType::RenderTarget.keeps_cpu_copy(false));
        assert!(!TextureType::Immutable.keeps_cpu_copy(true));
        assert!(TextureType::Immutable.keeps_cpu_copy(false));
        assert!(!TextureType::Volatile.keeps_cpu_copy(false));
    }

    #[test]
    fn load_mode_flags() {
        assert!(LoadMode::Async.is_async());
        assert!(!LoadMode::Async.is_on_demand());
        assert!(LoadMode::AsyncOnDemand.is_async());
        assert!(LoadMode::AsyncOnDemand.is_on_demand());
        assert!(LoadMode::OnDemand.is_on_demand());
        assert!(!LoadMode::Immediate.is_async());
    }

    #[test]
    fn serde_names_are_snake_case() {
        let json = serde_json::to_string(&BlendMode::Overwrite).unwrap();
        assert_eq!(json, "\"overwrite\"");
        let op: RenderOp = serde_json::from_str("\"triangle_fan\"").unwrap();
        assert_eq!(op, RenderOp::TriangleFan);
    }
}
