use std::path::PathBuf;
use std::time::Duration;

use sandbox::{NetworkMode, ResourceLimits};
use serde::Serialize;

use crate::config::SandboxSettings;

/// One piece of code to run, with everything that bounds the run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub code: String,
    pub image: String,
    pub timeout: Duration,
    pub limits: ResourceLimits,
    pub network: NetworkMode,
    pub env_file: Option<PathBuf>,
    pub command: Vec<String>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, settings: &SandboxSettings) -> Self {
        Self {
            code: code.into(),
            image: settings.image.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            limits: ResourceLimits {
                cpus: settings.cpus,
                memory_mb: settings.memory_mb,
            },
            network: settings.network.into(),
            env_file: settings.env_file.clone(),
            command: settings.command.clone(),
        }
    }
}

/// A completed run. `stderr` has secrets masked.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub urls: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// URLs as one `", "`-separated string; empty when nothing was uploaded.
    pub fn joined_urls(&self) -> String {
        self.urls.join(", ")
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
