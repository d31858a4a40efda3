use std::path::PathBuf;

/// Failures of the object store gateway.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("missing store setting {0}")]
    MissingSetting(&'static str),

    #[error("invalid endpoint {endpoint}: {detail}")]
    InvalidEndpoint { endpoint: String, detail: String },

    #[error("presign failed: {0}")]
    Presign(String),

    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("store request failed: {0}")]
    Request(String),

    #[error("upload rejected with HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("watch directory {0} does not exist")]
    MissingDir(PathBuf),

    #[error("file watch failed: {0}")]
    Notify(#[from] notify::Error),

    #[error("invalid setting {name}={value}")]
    InvalidSetting { name: &'static str, value: String },

    #[error("empty command")]
    EmptyCommand,

    #[error("spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("create sentinel {path}: {source}")]
    Sentinel {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
