//! Core data model: element types, shapes, and test cases.

use crate::error::{Result, TilecheckError};
use std::fmt;

/// Fixed-width integer element type of a tensor under test.
///
/// The width determines the codec behavior and the modulus for
/// reference-model wraparound; signedness only selects the C type name
/// baked into the kernel build (the comparison path is unsigned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl ElementType {
    /// All eight element types, in the order the original test matrix
    /// enumerates them.
    pub const ALL: [ElementType; 8] = [
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
    ];

    /// Element width in bytes.
    pub fn width(&self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 => 4,
            Self::I64 | Self::U64 => 8,
        }
    }

    pub fn signed(&self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// C type name passed to the kernel build as `TEST_TENSOR_TYPE`.
    pub fn c_name(&self) -> &'static str {
        match self {
            Self::I8 => "char",
            Self::U8 => "uchar",
            Self::I16 => "short",
            Self::U16 => "ushort",
            Self::I32 => "int",
            Self::U32 => "uint",
            Self::I64 => "long",
            Self::U64 => "ulong",
        }
    }

    /// Parse a C type name back into an element type.
    pub fn from_c_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.c_name() == name)
    }

    /// Bit mask reducing a value modulo `2^(8*width)`.
    ///
    /// For 8-byte elements the modulus is the full `u64` range, so the
    /// mask is the identity and wrapping arithmetic does the reduction.
    pub fn mask(&self) -> u64 {
        match self.width() {
            8 => u64::MAX,
            w => (1u64 << (8 * w)) - 1,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.c_name())
    }
}

/// Compute mode a kernel family implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeMode {
    /// Each output cell is its input value plus the in-bounds axis-aligned
    /// neighbors, reduced modulo the element width.
    Cross,
    /// Each output cell is its input value, optionally transformed (see
    /// [`CopyTransform`]).
    Copy,
}

impl ComputeMode {
    /// Name passed to the kernel build as `TEST_COMPUTE_TYPE`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cross => "CROSS",
            Self::Copy => "COPY",
        }
    }
}

impl fmt::Display for ComputeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-program reference transform for COPY mode.
///
/// Which transform a kernel family uses is test-definition configuration,
/// never inferred from the kernel itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CopyTransform {
    /// Expected output equals the input.
    #[default]
    Identity,
    /// Expected output is `(v+1)(v+2)(v+3)` reduced modulo the element
    /// width.
    Cubic,
}

impl CopyTransform {
    /// Apply the transform to a decoded element value.
    pub fn apply(&self, v: u64, elem: ElementType) -> u64 {
        let out = match self {
            Self::Identity => v,
            Self::Cubic => v
                .wrapping_add(1)
                .wrapping_mul(v.wrapping_add(2))
                .wrapping_mul(v.wrapping_add(3)),
        };
        out & elem.mask()
    }
}

/// Tensor dimensions in elements. Both dimensions are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorShape {
    width: u32,
    height: u32,
}

impl TensorShape {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TilecheckError::InvalidArgument(format!(
                "tensor dimensions must be at least 1, got [{width}, {height}]"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Element count.
    pub fn elements(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Byte length of a dense row-major buffer of this shape.
    pub fn byte_len(&self, elem: ElementType) -> usize {
        self.elements() * elem.width()
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.width, self.height)
    }
}

/// Tile dimensions in elements. Both dimensions are at least 1; tiles may
/// exceed the tensor in either dimension (the kernel clamps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileShape {
    width: u32,
    height: u32,
}

impl TileShape {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TilecheckError::InvalidArgument(format!(
                "tile dimensions must be at least 1, got [{width}, {height}]"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl fmt::Display for TileShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.width, self.height)
    }
}

/// How a program names its exported entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryStyle {
    /// Entry point shares the program name.
    #[default]
    Bare,
    /// Entry point is `<program>_kernel`.
    KernelSuffix,
}

impl EntryStyle {
    pub fn entry_name(&self, program: &str) -> String {
        match self {
            Self::Bare => program.to_string(),
            Self::KernelSuffix => format!("{program}_kernel"),
        }
    }
}

/// One test case: an immutable tuple of everything that determines a
/// single kernel invocation and its expected output.
///
/// The expected output never depends on `tile`; tiling is a partitioning
/// detail that must not change the mathematical result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestCase {
    pub program: String,
    pub elem: ElementType,
    pub mode: ComputeMode,
    pub tensor: TensorShape,
    pub tile: TileShape,
    /// Whether the 10-argument signature with external strides is under
    /// test for this case.
    pub strided: bool,
}

/// The subset of a test case that is baked into a build/compile step.
///
/// Two cases with equal signatures share one compiled artifact; tile shape
/// never participates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodegenSignature {
    pub program: String,
    pub entry: String,
    pub elem: ElementType,
    pub mode: ComputeMode,
    /// Tensor dimensions, present only for programs that bake them in as
    /// build constants.
    pub baked_dims: Option<TensorShape>,
}

impl fmt::Display for CodegenSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}_{}", self.program, self.mode, self.elem, self.entry)?;
        if let Some(dims) = self.baked_dims {
            write!(f, "_{}_{}", dims.width(), dims.height())?;
        }
        Ok(())
    }
}
