//! Build invocation for native kernel artifacts.
//!
//! Wraps the compiler subprocess behind a [`Compiler`] trait so the
//! build step captures exit status and stderr explicitly and can be
//! replaced by a test double.

use std::path::Path;
use std::process::Command;
use tilecheck_common::{CodegenSignature, Result, TilecheckError};
use tracing::debug;

/// Build-time options shared by both backend variants.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Compiler executable for the native variant.
    pub compiler: Option<String>,
    /// Extra header search path, passed as `-I`.
    pub include_path: Option<String>,
    /// Extra preprocessor definitions appended verbatim.
    pub extra_defines: Vec<String>,
}

impl BuildOptions {
    /// Read the recognized environment options.
    ///
    /// `TILECHECK_CC` overrides the compiler, `TILECHECK_INCLUDE_PATH`
    /// adds a header search path, and `TILECHECK_EXTRA_DEFINES` appends
    /// whitespace-separated options to the build command.
    pub fn from_env() -> Self {
        let extra_defines = std::env::var("TILECHECK_EXTRA_DEFINES")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            compiler: std::env::var("TILECHECK_CC").ok(),
            include_path: std::env::var("TILECHECK_INCLUDE_PATH").ok(),
            extra_defines,
        }
    }

    pub fn compiler_command(&self) -> &str {
        self.compiler.as_deref().unwrap_or("clang")
    }
}

/// Preprocessor definitions derived from a codegen signature.
///
/// These are the build-time parameters; tile shape is deliberately absent.
pub fn codegen_defines(sig: &CodegenSignature) -> Vec<String> {
    let mut defines = vec![
        format!("TEST_TENSOR_TYPE={}", sig.elem.c_name()),
        format!("TEST_COMPUTE_TYPE={}", sig.mode.name()),
        format!("KERNEL_NAME={}", sig.entry),
    ];
    if let Some(dims) = sig.baked_dims {
        defines.push(format!("TENSOR_WIDTH={}", dims.width()));
        defines.push(format!("TENSOR_HEIGHT={}", dims.height()));
        defines.push(format!("EXTERNAL_STRIDE_IN={}", dims.width()));
        defines.push(format!("EXTERNAL_STRIDE_OUT={}", dims.width()));
    }
    defines
}

/// One native build: kernel source in, loadable artifact out.
#[derive(Debug)]
pub struct BuildRequest<'a> {
    pub source: &'a Path,
    pub artifact: &'a Path,
    pub sig: &'a CodegenSignature,
}

/// Build-step abstraction; the production implementation shells out to
/// clang, test doubles count or fake invocations.
pub trait Compiler {
    fn compile(&self, req: &BuildRequest<'_>, options: &BuildOptions) -> Result<()>;
}

/// Compiles kernel source to a shared object with clang (or the
/// `TILECHECK_CC` override).
#[derive(Debug, Default)]
pub struct ClangCompiler;

impl Compiler for ClangCompiler {
    fn compile(&self, req: &BuildRequest<'_>, options: &BuildOptions) -> Result<()> {
        let program = &req.sig.program;
        if !req.source.exists() {
            return Err(TilecheckError::Build {
                program: program.clone(),
                reason: format!("kernel source not found: {}", req.source.display()),
            });
        }

        // A stale artifact with the same name must never be picked up.
        let _ = std::fs::remove_file(req.artifact);

        let mut cmd = Command::new(options.compiler_command());
        if let Some(include) = &options.include_path {
            cmd.arg(format!("-I{include}"));
        }
        for define in codegen_defines(req.sig) {
            cmd.arg(format!("-D{define}"));
        }
        for extra in &options.extra_defines {
            cmd.arg(extra);
        }
        cmd.arg("-fPIC").arg("-shared").arg("-o").arg(req.artifact).arg(req.source);

        debug!(?cmd, program = %program, "compiling kernel");

        let output = cmd.output().map_err(|e| TilecheckError::Build {
            program: program.clone(),
            reason: format!("failed to spawn {}: {e}", options.compiler_command()),
        })?;

        if !output.status.success() {
            return Err(TilecheckError::Build {
                program: program.clone(),
                reason: format!(
                    "{} exited with {}: {}",
                    options.compiler_command(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        if !req.artifact.exists() {
            return Err(TilecheckError::Build {
                program: program.clone(),
                reason: format!("artifact missing after build: {}", req.artifact.display()),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecheck_common::{ComputeMode, ElementType, TensorShape};

    fn sig(baked: bool) -> CodegenSignature {
        CodegenSignature {
            program: "cross".to_string(),
            entry: "cross_kernel".to_string(),
            elem: ElementType::U16,
            mode: ComputeMode::Cross,
            baked_dims: baked.then(|| TensorShape::new(17, 9).unwrap()),
        }
    }

    #[test]
    fn defines_cover_type_mode_and_entry() {
        let defines = codegen_defines(&sig(false));
        assert!(defines.contains(&"TEST_TENSOR_TYPE=ushort".to_string()));
        assert!(defines.contains(&"TEST_COMPUTE_TYPE=CROSS".to_string()));
        assert!(defines.contains(&"KERNEL_NAME=cross_kernel".to_string()));
        assert_eq!(defines.len(), 3);
    }

    #[test]
    fn baked_dims_add_tensor_and_stride_defines() {
        let defines = codegen_defines(&sig(true));
        assert!(defines.contains(&"TENSOR_WIDTH=17".to_string()));
        assert!(defines.contains(&"TENSOR_HEIGHT=9".to_string()));
        assert!(defines.contains(&"EXTERNAL_STRIDE_IN=17".to_string()));
        assert!(defines.contains(&"EXTERNAL_STRIDE_OUT=17".to_string()));
    }

    #[test]
    fn tile_shape_never_appears_in_defines() {
        for define in codegen_defines(&sig(true)) {
            assert!(!define.contains("TILE"), "unexpected define: {define}");
        }
    }

    #[test]
    fn default_compiler_is_clang() {
        let options = BuildOptions::default();
        assert_eq!(options.compiler_command(), "clang");
    }

    #[test]
    fn compiler_override_is_honored() {
        let options =
            BuildOptions { compiler: Some("gcc-13".to_string()), ..Default::default() };
        assert_eq!(options.compiler_command(), "gcc-13");
    }

    #[test]
    fn missing_source_is_a_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let sig = sig(false);
        let req = BuildRequest {
            source: &dir.path().join("does_not_exist.c"),
            artifact: &dir.path().join("out.so"),
            sig: &sig,
        };
        let err = ClangCompiler.compile(&req, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, TilecheckError::Build { .. }));
        assert!(err.to_string().contains("not found"));
    }
}
