//! Run configuration for the harness.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tilecheck_common::CopyTransform;

/// Which backend variant drives the kernels under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Compile to a shared object and call through FFI.
    Native,
    /// Build kernel source against an OpenCL device queue.
    Opencl,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Opencl => "opencl",
        }
    }
}

/// How input buffers are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputFill {
    /// Seeded random bytes (the default matrix input).
    Random,
    /// Each element holds its column index; a debugging aid that makes
    /// divergences easy to read.
    ColumnIndex,
}

/// COPY-mode reference transform applied to the run's programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyTransformArg {
    /// Expected output equals the input.
    Identity,
    /// Expected output is the cubic polynomial `(v+1)(v+2)(v+3)` reduced
    /// modulo the element width.
    Cubic,
}

impl CopyTransformArg {
    pub fn to_transform(self) -> CopyTransform {
        match self {
            Self::Identity => CopyTransform::Identity,
            Self::Cubic => CopyTransform::Cubic,
        }
    }
}

/// Everything that shapes one harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Seed for all sampled dimensions and input data; equal seeds
    /// reproduce the run bit for bit.
    pub seed: u64,
    pub backend: BackendKind,
    /// Directory holding kernel sources, resolved per program name.
    pub kernel_dir: PathBuf,
    /// Sampled tensor widths/heights per axis.
    pub dims_per_axis: usize,
    /// Sampled tile sizes per axis, in addition to the degenerate 1 and
    /// full-dimension tiles.
    pub tiles_per_axis: usize,
    /// Enable the external-stride matrix axis (native backend only).
    pub strided: bool,
    /// Capacity of the compiled-artifact cache.
    pub cache_slots: usize,
    pub input_fill: InputFill,
    /// Reference transform for COPY-mode cases.
    pub copy_transform: CopyTransformArg,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            backend: BackendKind::Native,
            kernel_dir: PathBuf::from("."),
            dims_per_axis: 3,
            tiles_per_axis: 1,
            strided: false,
            cache_slots: 8,
            input_fill: InputFill::Random,
            copy_transform: CopyTransformArg::Identity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_is_native() {
        assert_eq!(RunConfig::default().backend, BackendKind::Native);
    }

    #[test]
    fn default_cache_holds_multiple_slots() {
        // The single-slot memo thrashes under interleaved signatures.
        assert!(RunConfig::default().cache_slots > 1);
    }

    #[test]
    fn backend_names() {
        assert_eq!(BackendKind::Native.name(), "native");
        assert_eq!(BackendKind::Opencl.name(), "opencl");
    }

    #[test]
    fn copy_transform_arg_maps_onto_the_reference_transform() {
        assert_eq!(CopyTransformArg::Identity.to_transform(), CopyTransform::Identity);
        assert_eq!(CopyTransformArg::Cubic.to_transform(), CopyTransform::Cubic);
    }

    #[test]
    fn config_serializes_round_trip() {
        let config = RunConfig { seed: 42, strided: true, ..Default::default() };
        let json = serde_json::to_string(&config).unwrap();
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seed, 42);
        assert!(back.strided);
        assert_eq!(back.backend, BackendKind::Native);
    }
}
