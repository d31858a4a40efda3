mod check;
mod exec;

use std::path::PathBuf;

use clap::Args;

use runner::config::{self, Network, RunnerConfig};
use runner::error::RunnerResult;

pub use check::{CheckArgs, run_check};
pub use exec::{ExecArgs, run_exec};

/// Options shared by every subcommand that talks to Docker.
#[derive(Args)]
pub struct SandboxArgs {
    /// Path to runner.yaml config file
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Execution image
    #[arg(long, env = "DOCKER_CONTAINER_NAME")]
    image: Option<String>,
    /// Wall-clock limit in seconds
    #[arg(long, env = "PY_RUNTIME_TIMEOUT")]
    timeout_secs: Option<u64>,
    /// CPU ceiling in cores (fractional allowed)
    #[arg(long)]
    cpus: Option<f64>,
    /// Memory ceiling in MB
    #[arg(long)]
    memory_mb: Option<u32>,
    /// Network mode of the container
    #[arg(long, value_enum)]
    network: Option<Network>,
    /// Env file passed to the container
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl SandboxArgs {
    /// Load the config file (or defaults) and apply command-line overrides.
    async fn resolve(&self) -> RunnerResult<RunnerConfig> {
        let mut config = config::load_or_default(self.config.as_deref()).await?;
        let sandbox = &mut config.sandbox;
        if let Some(image) = &self.image {
            sandbox.image.clone_from(image);
        }
        if let Some(secs) = self.timeout_secs {
            sandbox.timeout_secs = secs;
        }
        if let Some(cpus) = self.cpus {
            sandbox.cpus = cpus;
        }
        if let Some(mb) = self.memory_mb {
            sandbox.memory_mb = mb;
        }
        if let Some(network) = self.network {
            sandbox.network = network;
        }
        if let Some(env_file) = &self.env_file {
            config::check_path_exists(env_file, "env_file").await?;
            sandbox.env_file = Some(env_file.clone());
        }
        sandbox.validate()?;
        Ok(config)
    }
}
