//! Foundation types for kestrel.
//!
//! This crate contains the backend-agnostic value types shared by every
//! kestrel crate: colors, vertex layouts, render-state enums, geometry,
//! decoded images, input events, configuration and error types.

pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod image;
pub mod input;
pub mod state;
pub mod vertex;
