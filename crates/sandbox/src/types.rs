use std::path::PathBuf;
use std::time::Duration;

use crate::config::{NetworkMode, ResourceLimits};

/// A host path made visible inside the isolated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

/// Everything needed to launch one isolated run.
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Unique per run; used to address the run for forced teardown.
    pub name: String,
    pub image: String,
    pub mounts: Vec<Mount>,
    /// File of `KEY=VALUE` lines injected as the run's environment.
    pub env_file: Option<PathBuf>,
    pub limits: ResourceLimits,
    pub network: NetworkMode,
    /// Overrides the image's default command when non-empty.
    pub command: Vec<String>,
    /// Wall-clock deadline for the whole run.
    pub timeout: Duration,
}

/// Captured result of a run that exited on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
