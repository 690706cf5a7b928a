//! Error taxonomy for the tilecheck harness.

use crate::types::{ComputeMode, ElementType, TensorShape, TileShape};
use thiserror::Error;

/// A single element divergence between kernel output and the reference
/// model, with the full context needed to reproduce it.
///
/// The `Display` form follows the one-line diagnostic the harness prints
/// before terminating.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "{program} failed at [{col}, {row}] {actual:#x} != {expected:#x} \
     tensor size {tensor}, tile size {tile}, tensor type {elem}, compute {mode}"
)]
pub struct Mismatch {
    pub program: String,
    pub col: u32,
    pub row: u32,
    pub actual: u64,
    pub expected: u64,
    pub tensor: TensorShape,
    pub tile: TileShape,
    pub elem: ElementType,
    pub mode: ComputeMode,
}

/// Errors produced anywhere in the harness.
///
/// Build and load failures are fatal for the current program; invocation
/// failures and mismatches are fatal for the whole run. No category is
/// ever retried.
#[derive(Debug, Error)]
pub enum TilecheckError {
    /// Compiler or kernel builder returned failure, or the artifact was
    /// missing afterwards.
    #[error("build failed for '{program}': {reason}")]
    Build { program: String, reason: String },

    /// Dynamic artifact or kernel symbol could not be resolved.
    #[error("load failed for '{symbol}': {reason}")]
    Load { symbol: String, reason: String },

    /// The kernel under test or the device runtime reported an error.
    #[error("kernel invocation failed: {0}")]
    Invocation(String),

    /// Actual output diverged from the reference model.
    #[error(transparent)]
    Mismatch(#[from] Mismatch),

    /// Element access outside the declared tensor shape.
    #[error("out of range: row={row}, col={col}, tensor size {tensor}")]
    OutOfRange { row: u32, col: u32, tensor: TensorShape },

    /// Buffer length does not match the declared shape and element width.
    #[error("buffer length {actual} does not match expected {expected} bytes")]
    BufferLength { actual: usize, expected: usize },

    /// Malformed harness input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, TilecheckError>;
