use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("isolation runtime not available: {0}")]
    RuntimeUnavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("image not available: {0}")]
    ImageNotFound(String),

    #[error("run exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("launch failed: {0}")]
    LaunchFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
