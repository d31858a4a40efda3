mod config;
mod error;
mod runtime;
mod types;

pub use config::{NetworkMode, ResourceLimits};
pub use error::{Result, SandboxError};
pub use runtime::IsolationRuntime;
pub use types::{Mount, RunOutput, RunSpec};
