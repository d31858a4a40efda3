use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use runner::Executor;
use runner::error::RunnerResult;
use sandbox_docker::DockerRuntime;
use tracing::{error, info};

use super::SandboxArgs;

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    sandbox: SandboxArgs,
}

/// Verify Docker and the execution image without running anything.
pub async fn run_check(args: CheckArgs) -> RunnerResult<ExitCode> {
    let config = args.sandbox.resolve().await?;
    let executor = Executor::new(Arc::new(DockerRuntime::new(config.docker_config())));

    match executor.preflight(&config.sandbox.image).await {
        Ok(()) => {
            info!(image = %config.sandbox.image, "docker and image available");
            println!("ok");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(kind = e.kind(), "preflight failed");
            eprintln!("error: {e}");
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
