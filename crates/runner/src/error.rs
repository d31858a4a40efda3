use std::time::Duration;

use sandbox::SandboxError;

/// Why a run did not produce a result. Each variant has its own
/// caller-facing message and process exit code.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Docker is not installed or not accessible: {0}")]
    EnvironmentUnavailable(String),

    #[error("Image '{image}' not found or inaccessible.")]
    ImageUnavailable { image: String },

    #[error("Code execution timed out after {0:?}.")]
    Timeout(Duration),

    #[error("Permission denied while accessing Docker. Try: sudo usermod -aG docker $USER")]
    PermissionDenied(String),

    #[error("Code execution failed (exit code {exit_code}): {detail}")]
    RuntimeFailure { exit_code: i32, detail: String },
}

impl ExecError {
    /// Short machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EnvironmentUnavailable(_) => "environment_unavailable",
            Self::ImageUnavailable { .. } => "image_unavailable",
            Self::Timeout(_) => "timeout",
            Self::PermissionDenied(_) => "permission_denied",
            Self::RuntimeFailure { .. } => "runtime_failure",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::EnvironmentUnavailable(_) => 2,
            Self::ImageUnavailable { .. } => 3,
            Self::Timeout(_) => 4,
            Self::PermissionDenied(_) => 5,
            Self::RuntimeFailure { .. } => 6,
        }
    }

    /// Map a backend error. `image` names the image of the failing run.
    pub fn from_sandbox(err: SandboxError, image: &str) -> Self {
        match err {
            SandboxError::RuntimeUnavailable(detail) => Self::EnvironmentUnavailable(detail),
            SandboxError::PermissionDenied(detail) => Self::PermissionDenied(detail),
            SandboxError::ImageNotFound(_) => Self::ImageUnavailable {
                image: image.to_string(),
            },
            SandboxError::Timeout(limit) => Self::Timeout(limit),
            SandboxError::LaunchFailed(detail) | SandboxError::InvalidConfig(detail) => {
                Self::RuntimeFailure {
                    exit_code: -1,
                    detail,
                }
            }
            SandboxError::Io(e) => Self::RuntimeFailure {
                exit_code: -1,
                detail: e.to_string(),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
