//! # sakuga-core
//!
//! Core types and primitives for the Sakuga exporter.
//! This crate contains foundational types shared across all Sakuga crates:
//! pixel buffers, content hashes, export configuration, filename helpers,
//! and error types.

pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod naming;

pub use config::{ExportConfig, ExportPolicy};
pub use error::{SakugaError, SakugaResult};
pub use frame::{FrameBuffer, PixelFormat};
pub use hash::ContentHash;
pub use naming::{make_unique_name, sanitize_name, zero_pad};
