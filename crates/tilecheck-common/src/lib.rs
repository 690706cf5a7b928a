//! Common types and pure logic for the tilecheck harness
//!
//! This crate provides the foundational pieces shared by every backend:
//! element/shape/test-case types, the variable-width byte codec, the
//! tile-independent reference model, and the error taxonomy.

pub mod codec;
pub mod error;
pub mod reference;
pub mod types;

pub use error::{Mismatch, Result, TilecheckError};
pub use types::{
    ComputeMode, CopyTransform, CodegenSignature, ElementType, EntryStyle, TensorShape, TestCase,
    TileShape,
};
