//! End-to-end check of the native pipeline against a real C kernel.
//!
//! Compiles a minimal kernel honoring the build-time contract
//! (`TEST_TENSOR_TYPE`, `TEST_COMPUTE_TYPE`, `KERNEL_NAME`) and runs the
//! full matrix through the driver. Requires a working clang, so the test
//! is ignored by default.

use std::fs;
use tilecheck_harness::{BackendKind, Driver, ProgramSpec, RunConfig};
use tilecheck_kernels::NativeBackend;

const KERNEL_SOURCE: &str = r#"
typedef unsigned char uchar;
typedef unsigned short ushort;
typedef unsigned int uint;
typedef unsigned long ulong;

#define CROSS 1
#define COPY 2

void KERNEL_NAME(const TEST_TENSOR_TYPE *in, int in_stride,
                 TEST_TENSOR_TYPE *out, int out_stride, int tensor_width,
                 int tensor_height, int tile_width, int tile_height) {
    (void)tile_width;
    (void)tile_height;
    for (int row = 0; row < tensor_height; row++) {
        for (int col = 0; col < tensor_width; col++) {
            unsigned long long acc =
                (unsigned long long)(TEST_TENSOR_TYPE)in[row * in_stride + col];
#if TEST_COMPUTE_TYPE == CROSS
            if (col > 0)
                acc += (unsigned long long)(TEST_TENSOR_TYPE)in[row * in_stride + col - 1];
            if (col < tensor_width - 1)
                acc += (unsigned long long)(TEST_TENSOR_TYPE)in[row * in_stride + col + 1];
            if (row > 0)
                acc += (unsigned long long)(TEST_TENSOR_TYPE)in[(row - 1) * in_stride + col];
            if (row < tensor_height - 1)
                acc += (unsigned long long)(TEST_TENSOR_TYPE)in[(row + 1) * in_stride + col];
#endif
            out[row * out_stride + col] = (TEST_TENSOR_TYPE)acc;
        }
    }
}
"#;

#[test]
#[ignore = "requires clang on PATH"]
fn full_matrix_passes_against_a_real_kernel() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("whole_tensor.c"), KERNEL_SOURCE).expect("write kernel");

    let config = RunConfig {
        kernel_dir: dir.path().to_path_buf(),
        dims_per_axis: 2,
        tiles_per_axis: 1,
        ..RunConfig::default()
    };
    let backend = NativeBackend::new(dir.path().to_path_buf(), "c", false, 8);
    let mut driver = Driver::new(config, Box::new(backend));

    let program = ProgramSpec::from_arg("whole_tensor.c", BackendKind::Native);
    let report = driver.run_program(&program).expect("matrix passes");
    assert!(report.cases > 0);
}

#[test]
#[ignore = "requires clang on PATH"]
fn broken_kernel_source_is_a_build_failure() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("broken.c"), "this is not C").expect("write kernel");

    let config = RunConfig { kernel_dir: dir.path().to_path_buf(), ..RunConfig::default() };
    let backend = NativeBackend::new(dir.path().to_path_buf(), "c", false, 8);
    let mut driver = Driver::new(config, Box::new(backend));

    let program = ProgramSpec::from_arg("broken.c", BackendKind::Native);
    let outcome = driver.run(std::slice::from_ref(&program)).expect("run completes");
    assert_eq!(outcome.build_failures, 1);
    assert!(outcome.reports.is_empty());
}
