//! Harness for verifying tiled stencil kernels against a reference model
//!
//! Wires the pieces together: the test-matrix generator enumerates
//! geometries, a backend compiles and invokes the kernel under test, and
//! the comparator checks every output element against the
//! tile-independent reference model, failing fast on the first
//! divergence.

pub mod compare;
pub mod config;
pub mod driver;
pub mod matrix;
pub mod program;

pub use compare::compare;
pub use config::{BackendKind, CopyTransformArg, InputFill, RunConfig};
pub use driver::{Driver, ProgramReport, RunOutcome};
pub use matrix::{generate, MatrixLimits};
pub use program::{ProgramSpec, SourceKind};
