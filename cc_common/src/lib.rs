//! Shared error types and logging bootstrap used by both the IR and MIR
//! crates. Kept deliberately small: the cores are library components inside
//! a batch compiler process and do not need a diagnostics/source-location
//! stack, only a construction-failure error channel and an assertion
//! discipline for invariant violations (see `error` module docs).

pub mod error;

pub use error::{CompileError, CompileResult};

/// Initializes the `env_logger` backend once per process. Tests and any
/// embedding binary call this instead of touching `env_logger` directly so
/// the filter/format stays consistent across the workspace.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}
