use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RunnerError, RunnerResult};

pub(crate) const DEFAULT_IMAGE: &str = "py-runtime";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub(crate) const DEFAULT_CPUS: f64 = 2.0;
pub(crate) const DEFAULT_MEMORY_MB: u32 = 2048;
pub(crate) const DEFAULT_ENV_FILE: &str = ".env";
/// Docker refuses memory limits below 6 MB.
const MIN_MEMORY_MB: u32 = 6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub docker: DockerSettings,
    pub sandbox: SandboxSettings,
    /// Directory for staged code files. Must be visible to the Docker daemon.
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerSettings {
    pub binary: PathBuf,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("docker"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Bridge,
    None,
}

impl From<Network> for sandbox::NetworkMode {
    fn from(n: Network) -> Self {
        match n {
            Network::Bridge => Self::Bridge,
            Network::None => Self::None,
        }
    }
}

/// Per-run defaults. Every field can be overridden from the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    pub image: String,
    pub timeout_secs: u64,
    pub cpus: f64,
    pub memory_mb: u32,
    pub network: Network,
    /// Passed to the container as `--env-file`; holds the store credentials.
    pub env_file: Option<PathBuf>,
    /// Container command. Empty runs the image's own default, which for the
    /// image in `crates/guest-watcher/Dockerfile` is
    /// `guest-watcher run -- python3 /app/code.py`.
    pub command: Vec<String>,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cpus: DEFAULT_CPUS,
            memory_mb: DEFAULT_MEMORY_MB,
            network: Network::Bridge,
            env_file: Some(PathBuf::from(DEFAULT_ENV_FILE)),
            command: Vec::new(),
        }
    }
}

impl SandboxSettings {
    pub fn validate(&self) -> RunnerResult<()> {
        if !(self.cpus.is_finite() && self.cpus > 0.0) {
            return Err(RunnerError::Config(format!(
                "cpus must be greater than 0, got {}",
                self.cpus
            )));
        }
        if self.memory_mb < MIN_MEMORY_MB {
            return Err(RunnerError::Config(format!(
                "memory_mb must be at least {MIN_MEMORY_MB}, got {}",
                self.memory_mb
            )));
        }
        if self.timeout_secs == 0 {
            return Err(RunnerError::Config("timeout_secs must be greater than 0".into()));
        }
        if self.image.trim().is_empty() {
            return Err(RunnerError::Config("image must not be empty".into()));
        }
        Ok(())
    }
}

/// Load and validate a runner config from a YAML file.
///
/// Relative paths in the config are resolved against the config file's parent directory.
pub async fn load(path: &Path) -> RunnerResult<RunnerConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RunnerError::Config(format!("read {}: {e}", path.display())))?;
    let mut config: RunnerConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| RunnerError::Config(format!("parse {}: {e}", path.display())))?;
    if let Some(config_dir) = path.parent() {
        config.resolve_relative_paths(config_dir);
    }
    config.sandbox.validate()?;
    validate_paths(&config).await?;
    Ok(config)
}

/// Load `path` if given, otherwise start from the defaults.
///
/// Without a config file the default `.env` is used only when it exists in
/// the working directory.
pub async fn load_or_default(path: Option<&Path>) -> RunnerResult<RunnerConfig> {
    if let Some(path) = path {
        return load(path).await;
    }
    let mut config = RunnerConfig::default();
    if let Some(env_file) = &config.sandbox.env_file
        && !tokio::fs::try_exists(env_file).await.unwrap_or(false)
    {
        warn!(env_file = %env_file.display(), "env file not found, running without it");
        config.sandbox.env_file = None;
    }
    Ok(config)
}

pub async fn check_path_exists(path: &Path, label: &str) -> RunnerResult<()> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|e| RunnerError::Config(format!("check {label}: {e}")))?;
    if !exists {
        return Err(RunnerError::Config(format!(
            "{label} not found: {}",
            path.display()
        )));
    }
    Ok(())
}

async fn validate_paths(config: &RunnerConfig) -> RunnerResult<()> {
    if let Some(env_file) = &config.sandbox.env_file {
        check_path_exists(env_file, "env_file").await?;
    }
    if let Some(dir) = &config.staging_dir {
        check_path_exists(dir, "staging_dir").await?;
    }
    Ok(())
}

impl RunnerConfig {
    /// Resolve relative paths against `config_dir` (the directory containing the YAML file).
    fn resolve_relative_paths(&mut self, config_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = config_dir.join(&*p);
            }
        };
        if let Some(env_file) = &mut self.sandbox.env_file {
            resolve(env_file);
        }
        if let Some(dir) = &mut self.staging_dir {
            resolve(dir);
        }
        // A bare program name is looked up on PATH, not next to the config.
        if self.docker.binary.components().count() > 1 {
            resolve(&mut self.docker.binary);
        }
    }

    pub fn docker_config(&self) -> sandbox_docker::DockerConfig {
        sandbox_docker::DockerConfig {
            binary: self.docker.binary.clone(),
            ..sandbox_docker::DockerConfig::default()
        }
    }
}
