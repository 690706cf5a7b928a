//! Per-program test definitions.
//!
//! A kernel family's capabilities are configuration, not inference: which
//! compute modes it supports, which COPY transform its reference uses,
//! how its entry point is named, and whether tensor dimensions are baked
//! into its build.

use crate::config::BackendKind;
use tilecheck_common::{
    CodegenSignature, ComputeMode, CopyTransform, EntryStyle, TestCase,
};

/// Kernel source flavor, derived from the program's file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    C,
    Cpp,
    OpenCl,
}

impl SourceKind {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::OpenCl => "cl",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "c" => Some(Self::C),
            "cpp" | "cc" => Some(Self::Cpp),
            "cl" => Some(Self::OpenCl),
            _ => None,
        }
    }

    fn default_for(backend: BackendKind) -> Self {
        match backend {
            BackendKind::Native => Self::C,
            BackendKind::Opencl => Self::OpenCl,
        }
    }
}

/// Test definition for one kernel program.
#[derive(Debug, Clone)]
pub struct ProgramSpec {
    pub name: String,
    pub kind: SourceKind,
    /// Compute modes this kernel family implements.
    pub modes: Vec<ComputeMode>,
    /// Reference transform for COPY mode.
    pub copy_transform: CopyTransform,
    pub entry: EntryStyle,
    /// Whether tensor dimensions are baked into the build as constants,
    /// making them part of the codegen signature.
    pub bake_dims: bool,
}

impl ProgramSpec {
    /// Build a spec from a command-line program identifier.
    ///
    /// Any file suffix is stripped for convenience; when present it
    /// selects the source flavor, otherwise the backend's default is
    /// used. The C++ flavor follows its runner conventions: `_kernel`
    /// entry suffix, both compute modes, and baked tensor dimensions.
    pub fn from_arg(arg: &str, backend: BackendKind) -> Self {
        let file_name = arg.rsplit(['/', '\\']).next().unwrap_or(arg);
        let (name, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if SourceKind::from_extension(ext).is_some() => (stem, Some(ext)),
            _ => (file_name, None),
        };
        let kind = ext
            .and_then(SourceKind::from_extension)
            .unwrap_or_else(|| SourceKind::default_for(backend));

        let (entry, bake_dims, mut modes) = match kind {
            SourceKind::Cpp => {
                (EntryStyle::KernelSuffix, true, vec![ComputeMode::Cross, ComputeMode::Copy])
            }
            SourceKind::C | SourceKind::OpenCl => {
                (EntryStyle::Bare, false, vec![ComputeMode::Cross])
            }
        };

        // The duplex-simple family implements COPY only.
        if name.contains("duplex_simple") {
            modes.retain(|m| *m == ComputeMode::Copy);
            if modes.is_empty() {
                modes.push(ComputeMode::Copy);
            }
        }

        Self {
            name: name.to_string(),
            kind,
            modes,
            copy_transform: CopyTransform::Identity,
            entry,
            bake_dims,
        }
    }

    /// Override the COPY reference transform for this program.
    pub fn with_copy_transform(mut self, transform: CopyTransform) -> Self {
        self.copy_transform = transform;
        self
    }

    /// Exported entry-point name for this program.
    pub fn entry_name(&self) -> String {
        self.entry.entry_name(&self.name)
    }

    /// The codegen-relevant signature for `case`. Tile shape never
    /// participates.
    pub fn signature(&self, case: &TestCase) -> CodegenSignature {
        CodegenSignature {
            program: self.name.clone(),
            entry: self.entry_name(),
            elem: case.elem,
            mode: case.mode,
            baked_dims: self.bake_dims.then_some(case.tensor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecheck_common::{ElementType, TensorShape, TileShape};

    fn case(spec: &ProgramSpec, w: u32, h: u32, tile_w: u32, tile_h: u32) -> TestCase {
        TestCase {
            program: spec.name.clone(),
            elem: ElementType::U8,
            mode: spec.modes[0],
            tensor: TensorShape::new(w, h).unwrap(),
            tile: TileShape::new(tile_w, tile_h).unwrap(),
            strided: false,
        }
    }

    #[test]
    fn suffix_is_stripped() {
        let spec = ProgramSpec::from_arg("double_buffering.c", BackendKind::Native);
        assert_eq!(spec.name, "double_buffering");
        assert_eq!(spec.kind, SourceKind::C);
    }

    #[test]
    fn path_components_are_stripped() {
        let spec = ProgramSpec::from_arg("samples/kernels/cross.cl", BackendKind::Opencl);
        assert_eq!(spec.name, "cross");
        assert_eq!(spec.kind, SourceKind::OpenCl);
    }

    #[test]
    fn unknown_suffix_stays_in_the_name() {
        let spec = ProgramSpec::from_arg("cross.v2", BackendKind::Native);
        assert_eq!(spec.name, "cross.v2");
        assert_eq!(spec.kind, SourceKind::C);
    }

    #[test]
    fn backend_default_flavors() {
        assert_eq!(ProgramSpec::from_arg("cross", BackendKind::Native).kind, SourceKind::C);
        assert_eq!(ProgramSpec::from_arg("cross", BackendKind::Opencl).kind, SourceKind::OpenCl);
    }

    #[test]
    fn c_flavor_uses_bare_entry_and_cross_only() {
        let spec = ProgramSpec::from_arg("cross.c", BackendKind::Native);
        assert_eq!(spec.entry_name(), "cross");
        assert_eq!(spec.modes, vec![ComputeMode::Cross]);
        assert!(!spec.bake_dims);
    }

    #[test]
    fn cpp_flavor_uses_kernel_suffix_both_modes_and_baked_dims() {
        let spec = ProgramSpec::from_arg("double_buffering.cpp", BackendKind::Native);
        assert_eq!(spec.entry_name(), "double_buffering_kernel");
        assert_eq!(spec.modes, vec![ComputeMode::Cross, ComputeMode::Copy]);
        assert!(spec.bake_dims);
    }

    #[test]
    fn copy_transform_defaults_to_identity_and_is_overridable() {
        let spec = ProgramSpec::from_arg("duplex_simple_buffering.cpp", BackendKind::Native);
        assert_eq!(spec.copy_transform, CopyTransform::Identity);
        let spec = spec.with_copy_transform(CopyTransform::Cubic);
        assert_eq!(spec.copy_transform, CopyTransform::Cubic);
    }

    #[test]
    fn duplex_simple_family_is_copy_only() {
        let spec = ProgramSpec::from_arg("duplex_simple_buffering.cpp", BackendKind::Native);
        assert_eq!(spec.modes, vec![ComputeMode::Copy]);
    }

    #[test]
    fn signature_omits_dims_unless_baked() {
        let spec = ProgramSpec::from_arg("cross.c", BackendKind::Native);
        let sig = spec.signature(&case(&spec, 7, 5, 2, 2));
        assert!(sig.baked_dims.is_none());

        let spec = ProgramSpec::from_arg("cross.cpp", BackendKind::Native);
        let sig = spec.signature(&case(&spec, 7, 5, 2, 2));
        assert_eq!(sig.baked_dims, Some(TensorShape::new(7, 5).unwrap()));
    }

    #[test]
    fn tile_shape_does_not_change_the_signature() {
        let spec = ProgramSpec::from_arg("cross.cpp", BackendKind::Native);
        let a = spec.signature(&case(&spec, 7, 5, 1, 1));
        let b = spec.signature(&case(&spec, 7, 5, 64, 64));
        assert_eq!(a, b);
    }
}
