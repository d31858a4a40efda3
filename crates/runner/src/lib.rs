//! Host side of sandboxed code execution: stages code, runs it in a
//! resource-bounded container and collects the artifact URLs it reports.

pub mod config;
pub mod error;
pub mod executor;
pub mod masker;
pub mod staging;
pub mod types;

pub use error::{ExecError, RunnerError, RunnerResult};
pub use executor::Executor;
pub use types::{ExecutionRequest, ExecutionResult};
