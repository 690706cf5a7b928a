//! Native artifact backend: compile kernel source to a shared object,
//! resolve the exported entry point, and call it through FFI.
//!
//! The entry point is bound once per prepared signature with an explicit
//! typed symbol, so an arity mismatch surfaces as a load error at bind
//! time instead of a crash at call time. Artifacts live in scoped
//! temporary directories and are deleted on every exit path.

use crate::cache::ArtifactCache;
use crate::compile::{BuildOptions, BuildRequest, ClangCompiler, Compiler};
use crate::{dim_i32, KernelBackend, KernelRun};
use libloading::Library;
use std::path::PathBuf;
use tempfile::TempDir;
use tilecheck_common::{CodegenSignature, Result, TilecheckError};
use tracing::{debug, info};

/// Fixed 8-argument entry point: input, input stride, output, output
/// stride, tensor width, tensor height, tile width, tile height.
type KernelFixed = unsafe extern "C" fn(*const u8, i32, *mut u8, i32, i32, i32, i32, i32);

/// 10-argument entry point with external strides between the output
/// stride and the tensor dimensions.
type KernelStrided =
    unsafe extern "C" fn(*const u8, i32, *mut u8, i32, i32, i32, i32, i32, i32, i32);

enum Entry {
    Fixed(KernelFixed),
    Strided(KernelStrided),
}

/// A loaded kernel artifact. Field order matters: the entry pointer is
/// only valid while `_lib` is loaded, and the shared object file is
/// removed when `_dir` drops.
struct NativeArtifact {
    entry: Entry,
    _lib: Library,
    _dir: TempDir,
}

/// Backend driving kernels compiled to dynamically loadable shared
/// objects, generic over the build step for testability.
pub struct NativeBackend<C: Compiler = ClangCompiler> {
    compiler: C,
    options: BuildOptions,
    kernel_dir: PathBuf,
    source_ext: String,
    strided: bool,
    cache: ArtifactCache<NativeArtifact>,
    current: Option<CodegenSignature>,
}

impl NativeBackend<ClangCompiler> {
    /// Backend with the default clang build step. `source_ext` selects
    /// the kernel source flavor (`c` or `cpp`); `strided` binds the
    /// 10-argument entry signature.
    pub fn new(
        kernel_dir: PathBuf,
        source_ext: &str,
        strided: bool,
        cache_slots: usize,
    ) -> Self {
        Self::with_compiler(
            ClangCompiler,
            BuildOptions::from_env(),
            kernel_dir,
            source_ext,
            strided,
            cache_slots,
        )
    }
}

impl<C: Compiler> NativeBackend<C> {
    pub fn with_compiler(
        compiler: C,
        options: BuildOptions,
        kernel_dir: PathBuf,
        source_ext: &str,
        strided: bool,
        cache_slots: usize,
    ) -> Self {
        Self {
            compiler,
            options,
            kernel_dir,
            source_ext: source_ext.to_string(),
            strided,
            cache: ArtifactCache::new(cache_slots),
            current: None,
        }
    }

    fn source_path(&self, sig: &CodegenSignature) -> PathBuf {
        self.kernel_dir.join(format!("{}.{}", sig.program, self.source_ext))
    }
}

impl<C: Compiler> KernelBackend for NativeBackend<C> {
    fn name(&self) -> &'static str {
        "native"
    }

    fn prepare(&mut self, sig: &CodegenSignature) -> Result<()> {
        if self.current.as_ref() == Some(sig) {
            return Ok(());
        }

        let source = self.source_path(sig);
        let artifact_name = format!("{sig}.so");
        let strided = self.strided;
        let compiler = &self.compiler;
        let options = &self.options;

        self.cache.ensure_with(sig, || {
            let dir = TempDir::new()?;
            let artifact = dir.path().join(&artifact_name);
            compiler.compile(&BuildRequest { source: &source, artifact: &artifact, sig }, options)?;

            let lib = unsafe { Library::new(&artifact) }.map_err(|e| TilecheckError::Load {
                symbol: sig.entry.clone(),
                reason: format!("failed to load {}: {e}", artifact.display()),
            })?;

            let entry = unsafe {
                if strided {
                    let f = lib.get::<KernelStrided>(sig.entry.as_bytes()).map_err(|e| {
                        TilecheckError::Load {
                            symbol: sig.entry.clone(),
                            reason: format!("strided entry point not found: {e}"),
                        }
                    })?;
                    Entry::Strided(*f)
                } else {
                    let f = lib.get::<KernelFixed>(sig.entry.as_bytes()).map_err(|e| {
                        TilecheckError::Load {
                            symbol: sig.entry.clone(),
                            reason: format!("entry point not found: {e}"),
                        }
                    })?;
                    Entry::Fixed(*f)
                }
            };

            info!(signature = %sig, "compiled and bound native kernel");
            Ok(NativeArtifact { entry, _lib: lib, _dir: dir })
        })?;

        self.current = Some(sig.clone());
        Ok(())
    }

    fn invoke(&mut self, run: &mut KernelRun<'_>) -> Result<()> {
        let sig = self
            .current
            .as_ref()
            .ok_or_else(|| TilecheckError::Invocation("no kernel prepared".to_string()))?;
        let artifact = self.cache.get(sig).ok_or_else(|| {
            TilecheckError::Invocation(format!("prepared artifact for {sig} missing from cache"))
        })?;

        let expected = run.tensor.byte_len(run.elem);
        if run.input.len() != expected {
            return Err(TilecheckError::BufferLength { actual: run.input.len(), expected });
        }
        if run.output.len() != expected {
            return Err(TilecheckError::BufferLength { actual: run.output.len(), expected });
        }

        let tw = dim_i32(run.tensor.width(), "tensor width")?;
        let th = dim_i32(run.tensor.height(), "tensor height")?;
        let tile_w = dim_i32(run.tile.width(), "tile width")?;
        let tile_h = dim_i32(run.tile.height(), "tile height")?;

        debug!(signature = %sig, tensor = %run.tensor, tile = %run.tile, "invoking native kernel");

        match (&artifact.entry, run.external) {
            (Entry::Fixed(f), None) => unsafe {
                f(run.input.as_ptr(), tw, run.output.as_mut_ptr(), tw, tw, th, tile_w, tile_h);
            },
            (Entry::Strided(f), Some(ext)) => {
                let ext_in = dim_i32(ext.input, "external input stride")?;
                let ext_out = dim_i32(ext.output, "external output stride")?;
                unsafe {
                    f(
                        run.input.as_ptr(),
                        tw,
                        run.output.as_mut_ptr(),
                        tw,
                        ext_in,
                        ext_out,
                        tw,
                        th,
                        tile_w,
                        tile_h,
                    );
                }
            }
            (Entry::Fixed(_), Some(_)) => {
                return Err(TilecheckError::Invocation(
                    "external strides supplied but the fixed 8-argument entry is bound".to_string(),
                ))
            }
            (Entry::Strided(_), None) => {
                return Err(TilecheckError::Invocation(
                    "strided entry bound but no external strides supplied".to_string(),
                ))
            }
        }

        Ok(())
    }

    fn release(&mut self) {
        self.cache.clear();
        self.current = None;
    }
}
