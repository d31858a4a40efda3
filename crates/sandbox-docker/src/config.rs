use std::path::PathBuf;

/// Bytes of stdout and of stderr kept per run.
pub const DEFAULT_OUTPUT_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Docker CLI binary, either a bare name resolved via `PATH` or a path.
    pub binary: PathBuf,
    /// Per-stream capture limit. Only the last `output_limit` bytes of each
    /// stream are returned.
    pub output_limit: usize,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("docker"),
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }
}
