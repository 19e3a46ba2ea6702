//! Error types for kestrel.

use std::io;

/// Errors produced by the kestrel render layer.
#[derive(Debug, thiserror::Error)]
pub enum KestrelError {
    #[error("device error: {0}")]
    Device(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("texture error: {0}")]
    Texture(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, KestrelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_display() {
        let e = KestrelError::Device("no adapter".into());
        assert_eq!(format!("{e}"), "device error: no adapter");
    }

    #[test]
    fn backend_error_display() {
        let e = KestrelError::Backend("map failed".into());
        assert_eq!(format!("{e}"), "backend error: map failed");
    }

    #[test]
    fn texture_error_display() {
        let e = KestrelError::Texture("size mismatch".into());
        assert_eq!(format!("{e}"), "texture error: size mismatch");
    }

    #[test]
    fn decode_error_display() {
        let e = KestrelError::Decode("bad header".into());
        assert_eq!(format!("{e}"), "decode error: bad header");
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: KestrelError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn toml_error_from_conversion() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid toml").unwrap_err();
        let e: KestrelError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let e: KestrelError = json_err.into();
        assert!(format!("{e}").contains("JSON error"));
    }
}
