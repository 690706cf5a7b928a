//! Device kernel backend via OpenCL 3.0.
//!
//! A context and command queue are created lazily once per process;
//! kernel source is built with the same codegen parameters as the native
//! variant, passed as preprocessor definitions. Kernels launch with a
//! single work item (parallelism inside the kernel is the kernel's own
//! concern) and results return through a blocking device-to-host copy,
//! so `invoke` has synchronous semantics.

use crate::cache::ArtifactCache;
use crate::compile::{codegen_defines, BuildOptions};
use crate::{dim_i32, KernelBackend, KernelRun};
use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{Device, CL_DEVICE_TYPE_ALL};
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, ClMem, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY};
use opencl3::platform::get_platforms;
use opencl3::program::Program;
use opencl3::types::CL_BLOCKING;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tilecheck_common::{CodegenSignature, Result, TilecheckError};
use tracing::{debug, info};

/// Process-wide OpenCL handles.
struct ClState {
    context: Context,
    queue: CommandQueue,
    local_mem_bytes: u64,
    device_name: String,
}

// SAFETY: OpenCL handles are thread-safe when used with proper
// synchronization; the surrounding Mutex serializes all access.
unsafe impl Send for ClState {}

static CL_STATE: OnceLock<std::result::Result<Mutex<ClState>, String>> = OnceLock::new();

fn env_index(key: &str) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn init_cl_state() -> std::result::Result<Mutex<ClState>, String> {
    let platform_index = env_index("TILECHECK_CL_PLATFORM");
    let device_index = env_index("TILECHECK_CL_DEVICE");

    let platforms = get_platforms().map_err(|e| format!("failed to get OpenCL platforms: {e}"))?;
    let platform = platforms
        .get(platform_index)
        .ok_or_else(|| format!("OpenCL platform index {platform_index} out of range"))?;

    let device_ids = platform
        .get_devices(CL_DEVICE_TYPE_ALL)
        .map_err(|e| format!("failed to enumerate devices: {e}"))?;
    let device_id = device_ids
        .get(device_index)
        .copied()
        .ok_or_else(|| format!("OpenCL device index {device_index} out of range"))?;

    let device = Device::new(device_id);
    let device_name = device.name().unwrap_or_default();
    let local_mem_bytes = device.local_mem_size().unwrap_or(0);

    let context = Context::from_device(&device)
        .map_err(|e| format!("failed to create OpenCL context: {e}"))?;
    let queue = CommandQueue::create_default_with_properties(&context, 0, 0)
        .map_err(|e| format!("failed to create command queue: {e}"))?;

    info!(device = %device_name, "OpenCL device backend initialized");
    Ok(Mutex::new(ClState { context, queue, local_mem_bytes, device_name }))
}

fn cl_state() -> Result<&'static Mutex<ClState>> {
    match CL_STATE.get_or_init(init_cl_state) {
        Ok(state) => Ok(state),
        Err(reason) => Err(TilecheckError::Invocation(reason.clone())),
    }
}

/// A kernel program built for one codegen signature.
struct DeviceProgram {
    program: Program,
    entry: String,
}

/// Backend enqueuing kernels on an OpenCL device.
pub struct DeviceBackend {
    kernel_dir: PathBuf,
    options: BuildOptions,
    cache: ArtifactCache<DeviceProgram>,
    current: Option<CodegenSignature>,
}

impl DeviceBackend {
    pub fn new(kernel_dir: PathBuf, cache_slots: usize) -> Self {
        Self {
            kernel_dir,
            options: BuildOptions::from_env(),
            cache: ArtifactCache::new(cache_slots),
            current: None,
        }
    }

    /// Name of the selected device, initializing the context if needed.
    pub fn device_name(&self) -> Result<String> {
        let state = cl_state()?;
        let state = state
            .lock()
            .map_err(|_| TilecheckError::Invocation("OpenCL state poisoned".to_string()))?;
        Ok(state.device_name.clone())
    }

    fn build_options(&self, sig: &CodegenSignature, local_mem_bytes: u64) -> String {
        let mut parts = Vec::new();
        if let Some(include) = &self.options.include_path {
            parts.push(format!("-I{include}"));
        }
        for define in codegen_defines(sig) {
            parts.push(format!("-D{define}"));
        }
        parts.push(format!("-DLOCAL_MEMORY_SIZE={local_mem_bytes}"));
        parts.extend(self.options.extra_defines.iter().cloned());
        parts.join(" ")
    }
}

impl KernelBackend for DeviceBackend {
    fn name(&self) -> &'static str {
        "opencl"
    }

    fn prepare(&mut self, sig: &CodegenSignature) -> Result<()> {
        if self.current.as_ref() == Some(sig) {
            return Ok(());
        }

        let source_path = self.kernel_dir.join(format!("{}.cl", sig.program));
        let state = cl_state()?;
        let state = state
            .lock()
            .map_err(|_| TilecheckError::Invocation("OpenCL state poisoned".to_string()))?;
        let options = self.build_options(sig, state.local_mem_bytes);

        self.cache.ensure_with(sig, || {
            let source = std::fs::read_to_string(&source_path).map_err(|e| {
                TilecheckError::Build {
                    program: sig.program.clone(),
                    reason: format!("failed to read {}: {e}", source_path.display()),
                }
            })?;

            let program = Program::create_and_build_from_source(&state.context, &source, &options)
                .map_err(|log| TilecheckError::Build {
                    program: sig.program.clone(),
                    reason: format!("kernel build failed: {log}"),
                })?;

            // Bind once so a missing entry point is a load error here, not
            // a crash at enqueue time.
            Kernel::create(&program, &sig.entry).map_err(|e| TilecheckError::Load {
                symbol: sig.entry.clone(),
                reason: format!("kernel not found in program: {e}"),
            })?;

            info!(signature = %sig, "built device kernel program");
            Ok(DeviceProgram { program, entry: sig.entry.clone() })
        })?;

        self.current = Some(sig.clone());
        Ok(())
    }

    fn invoke(&mut self, run: &mut KernelRun<'_>) -> Result<()> {
        if run.external.is_some() {
            return Err(TilecheckError::Invocation(
                "device backend does not support external strides".to_string(),
            ));
        }

        let sig = self
            .current
            .as_ref()
            .ok_or_else(|| TilecheckError::Invocation("no kernel prepared".to_string()))?;
        let prog = self.cache.get(sig).ok_or_else(|| {
            TilecheckError::Invocation(format!("prepared program for {sig} missing from cache"))
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

        let state = cl_state()?;
        let state = state
            .lock()
            .map_err(|_| TilecheckError::Invocation("OpenCL state poisoned".to_string()))?;

        let gpu_err = |what: &str| {
            let what = what.to_string();
            move |e: opencl3::error_codes::ClError| TilecheckError::Invocation(format!("{what}: {e}"))
        };

        let mut buf_in = unsafe {
            Buffer::<u8>::create(&state.context, CL_MEM_READ_ONLY, expected, std::ptr::null_mut())
                .map_err(gpu_err("input buffer create"))?
        };
        let buf_out = unsafe {
            Buffer::<u8>::create(&state.context, CL_MEM_WRITE_ONLY, expected, std::ptr::null_mut())
                .map_err(gpu_err("output buffer create"))?
        };

        unsafe {
            state
                .queue
                .enqueue_write_buffer(&mut buf_in, CL_BLOCKING, 0, run.input, &[])
                .map_err(gpu_err("input copy-in"))?;
        }

        let kernel = Kernel::create(&prog.program, &prog.entry).map_err(|e| {
            TilecheckError::Load {
                symbol: prog.entry.clone(),
                reason: format!("kernel create: {e}"),
            }
        })?;

        debug!(signature = %sig, tensor = %run.tensor, tile = %run.tile, "enqueuing device kernel");

        let event = unsafe {
            ExecuteKernel::new(&kernel)
                .set_arg(&buf_in.get())
                .set_arg(&tw)
                .set_arg(&buf_out.get())
                .set_arg(&tw)
                .set_arg(&tw)
                .set_arg(&th)
                .set_arg(&tile_w)
                .set_arg(&tile_h)
                .set_global_work_sizes(&[1])
                .enqueue_nd_range(&state.queue)
                .map_err(gpu_err("enqueue"))?
        };

        event.wait().map_err(gpu_err("kernel wait"))?;

        unsafe {
            state
                .queue
                .enqueue_read_buffer(&buf_out, CL_BLOCKING, 0, run.output, &[])
                .map_err(gpu_err("output copy-back"))?;
        }

        Ok(())
    }

    fn release(&mut self) {
        self.cache.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecheck_common::{ComputeMode, ElementType};

    #[test]
    fn build_options_carry_codegen_defines() {
        let backend = DeviceBackend::new(PathBuf::from("/kernels"), 1);
        let sig = CodegenSignature {
            program: "cross".to_string(),
            entry: "cross".to_string(),
            elem: ElementType::U8,
            mode: ComputeMode::Cross,
            baked_dims: None,
        };
        let opts = backend.build_options(&sig, 65536);
        assert!(opts.contains("-DTEST_TENSOR_TYPE=uchar"));
        assert!(opts.contains("-DTEST_COMPUTE_TYPE=CROSS"));
        assert!(opts.contains("-DKERNEL_NAME=cross"));
        assert!(opts.contains("-DLOCAL_MEMORY_SIZE=65536"));
    }

    #[test]
    fn env_index_defaults_to_zero() {
        assert_eq!(env_index("TILECHECK_SURELY_UNSET_INDEX"), 0);
    }
}
