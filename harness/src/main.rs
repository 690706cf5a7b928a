//! Command-line entry point for the tilecheck harness.

use clap::Parser;
use std::path::PathBuf;
use tilecheck_harness::{
    BackendKind, CopyTransformArg, Driver, InputFill, ProgramSpec, RunConfig, RunOutcome,
    SourceKind,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tilecheck",
    about = "Correctness oracle for tiled 2-D stencil kernels",
    version
)]
struct Cli {
    /// Kernel programs to test, by name or source path (extension selects
    /// the source flavor; bare names use the backend default).
    #[arg(required = true)]
    programs: Vec<String>,

    /// Backend driving the kernels.
    #[arg(long, value_enum, default_value_t = BackendKind::Native)]
    backend: BackendKind,

    /// Seed for matrix sampling and input data.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Directory holding kernel sources.
    #[arg(long, default_value = ".")]
    kernel_dir: PathBuf,

    /// Tensor widths/heights sampled per axis.
    #[arg(long, default_value_t = 3)]
    dims_per_axis: usize,

    /// Extra tile sizes sampled per axis beyond 1 and the full dimension.
    #[arg(long, default_value_t = 1)]
    tiles_per_axis: usize,

    /// Exercise the 10-argument entry signature with external strides
    /// (native backend only).
    #[arg(long)]
    strided: bool,

    /// Compiled artifacts kept alive at once.
    #[arg(long, default_value_t = 8)]
    cache_slots: usize,

    /// Input data pattern.
    #[arg(long, value_enum, default_value_t = InputFill::Random)]
    input_fill: InputFill,

    /// Reference transform for COPY-mode cases.
    #[arg(long, value_enum, default_value_t = CopyTransformArg::Identity)]
    copy_transform: CopyTransformArg,

    /// Log filter, overridden by RUST_LOG when set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn setup_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn make_backend(
    config: &RunConfig,
    kind: SourceKind,
) -> anyhow::Result<Box<dyn tilecheck_kernels::KernelBackend>> {
    match config.backend {
        BackendKind::Native => Ok(Box::new(tilecheck_kernels::NativeBackend::new(
            config.kernel_dir.clone(),
            kind.extension(),
            config.strided,
            config.cache_slots,
        ))),
        #[cfg(feature = "opencl")]
        BackendKind::Opencl => {
            let backend =
                tilecheck_kernels::device::DeviceBackend::new(config.kernel_dir.clone(), config.cache_slots);
            info!(device = %backend.device_name()?, "selected OpenCL device");
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "opencl"))]
        BackendKind::Opencl => {
            anyhow::bail!("this binary was built without the 'opencl' feature")
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<RunOutcome> {
    let config = RunConfig {
        seed: cli.seed,
        backend: cli.backend,
        kernel_dir: cli.kernel_dir,
        dims_per_axis: cli.dims_per_axis,
        tiles_per_axis: cli.tiles_per_axis,
        strided: cli.strided,
        cache_slots: cli.cache_slots,
        input_fill: cli.input_fill,
        copy_transform: cli.copy_transform,
    };
    if config.strided && config.backend != BackendKind::Native {
        anyhow::bail!("--strided is only supported on the native backend");
    }

    let programs: Vec<ProgramSpec> = cli
        .programs
        .iter()
        .map(|arg| {
            ProgramSpec::from_arg(arg, config.backend)
                .with_copy_transform(config.copy_transform.to_transform())
        })
        .collect();

    // Native kernels of different source flavors need different build
    // pipelines, so run one driver per flavor, preserving program order
    // within each.
    let mut flavors: Vec<SourceKind> = Vec::new();
    for program in &programs {
        if !flavors.contains(&program.kind) {
            flavors.push(program.kind);
        }
    }

    let mut outcome = RunOutcome { reports: Vec::new(), build_failures: 0 };
    for kind in flavors {
        let group: Vec<ProgramSpec> =
            programs.iter().filter(|p| p.kind == kind).cloned().collect();
        let backend = make_backend(&config, kind)?;
        let mut driver = Driver::new(config.clone(), backend);
        let partial = driver.run(&group)?;
        outcome.reports.extend(partial.reports);
        outcome.build_failures += partial.build_failures;
    }
    Ok(outcome)
}

fn main() {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match run(cli) {
        Ok(outcome) => {
            let cases: usize = outcome.reports.iter().map(|r| r.cases).sum();
            info!(
                programs = outcome.reports.len(),
                cases,
                build_failures = outcome.build_failures,
                "run complete"
            );
            if outcome.build_failures > 0 {
                std::process::exit(1);
            }
        }
        Err(err) => {
            error!("{err:#}");
            std::process::exit(1);
        }
    }
}
