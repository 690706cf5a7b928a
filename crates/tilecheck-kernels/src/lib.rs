//! Backend adapters for driving tiled stencil kernels.
//!
//! Two variants share one contract: the native backend compiles a kernel
//! to a shared object and calls its exported entry point through FFI; the
//! device backend builds OpenCL kernel source against a context/queue and
//! enqueues it with a blocking readback. Both own their compiled
//! artifacts through an explicit [`cache::ArtifactCache`] keyed by the
//! codegen-relevant signature.

use tilecheck_common::{CodegenSignature, ElementType, Result, TensorShape, TileShape};

pub mod cache;
pub mod compile;
#[cfg(feature = "opencl")]
pub mod device;
pub mod native;

pub use cache::ArtifactCache;
pub use compile::{BuildOptions, BuildRequest, ClangCompiler, Compiler};
pub use native::NativeBackend;

/// External stride pair for the 10-argument kernel signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalStrides {
    pub input: u32,
    pub output: u32,
}

/// Arguments for one kernel invocation.
///
/// Input and output are independent allocations; the kernel is never
/// assumed to alias them. Input and output strides equal the tensor width
/// unless external striding is explicitly under test.
pub struct KernelRun<'a> {
    pub input: &'a [u8],
    pub output: &'a mut [u8],
    pub tensor: TensorShape,
    pub tile: TileShape,
    pub elem: ElementType,
    /// Present only when the strided matrix axis is enabled.
    pub external: Option<ExternalStrides>,
}

/// One backend variant: compile/build, invoke, release.
pub trait KernelBackend {
    fn name(&self) -> &'static str;

    /// Ensure a compiled artifact for `sig` is loaded and bound.
    ///
    /// Idempotent: repeating the call with the signature already held is a
    /// no-op, and tile shape never participates in the signature.
    fn prepare(&mut self, sig: &CodegenSignature) -> Result<()>;

    /// Run the prepared kernel. Blocks until the output buffer is fully
    /// produced, even when the underlying execution model is asynchronous.
    fn invoke(&mut self, run: &mut KernelRun<'_>) -> Result<()>;

    /// Dispose every compiled artifact and temporary file.
    fn release(&mut self);
}

pub(crate) fn dim_i32(value: u32, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        tilecheck_common::TilecheckError::InvalidArgument(format!(
            "{what} {value} exceeds the 32-bit kernel argument range"
        ))
    })
}
