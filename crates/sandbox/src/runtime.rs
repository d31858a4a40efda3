use async_trait::async_trait;

use crate::error::Result;
use crate::types::{RunOutput, RunSpec};

#[async_trait]
pub trait IsolationRuntime: Send + Sync {
    /// Human-readable name for this runtime implementation (e.g. "docker").
    fn name(&self) -> &str;
    /// Verify the runtime is installed and reachable by the current user.
    ///
    /// Returns `RuntimeUnavailable` when it is missing or unreachable and
    /// `PermissionDenied` when the caller lacks the rights to use it.
    async fn check_runtime(&self) -> Result<()>;
    /// Whether the named execution image is present locally.
    async fn image_exists(&self, image: &str) -> Result<bool>;
    /// Launch a run and block until it exits or `spec.timeout` elapses.
    ///
    /// On timeout the whole run is torn down and reaped before
    /// `SandboxError::Timeout` is returned; no process of the run may
    /// outlive this call.
    async fn run(&self, spec: &RunSpec) -> Result<RunOutput>;
}
