use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use runner::error::{RunnerError, RunnerResult};
use runner::{ExecutionRequest, Executor};
use sandbox_docker::DockerRuntime;
use tokio::io::AsyncReadExt;
use tracing::error;

use super::SandboxArgs;

#[derive(Args)]
pub struct ExecArgs {
    /// Python file to run; `-` or omitted reads stdin
    file: Option<PathBuf>,
    #[command(flatten)]
    sandbox: SandboxArgs,
    /// Print the full result as JSON instead of one URL per line
    #[arg(long)]
    json: bool,
}

async fn read_code(file: Option<&PathBuf>) -> RunnerResult<String> {
    match file {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RunnerError::Config(format!("read {}: {e}", path.display()))),
        _ => {
            let mut code = String::new();
            tokio::io::stdin().read_to_string(&mut code).await?;
            Ok(code)
        }
    }
}

pub async fn run_exec(args: ExecArgs) -> RunnerResult<ExitCode> {
    let config = args.sandbox.resolve().await?;
    let code = read_code(args.file.as_ref()).await?;

    let runtime = Arc::new(DockerRuntime::new(config.docker_config()));
    let executor = Executor::new(runtime).with_staging_dir(config.staging_dir.clone());
    let request = ExecutionRequest::new(code, &config.sandbox);

    match executor.execute(&request).await {
        Ok(result) => {
            if args.json {
                let out = serde_json::to_string_pretty(&result)
                    .map_err(|e| RunnerError::Config(format!("serialize result: {e}")))?;
                println!("{out}");
            } else {
                for url in &result.urls {
                    println!("{url}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(kind = e.kind(), "execution failed");
            if args.json {
                let out = serde_json::json!({ "error": e.kind(), "message": e.to_string() });
                println!("{out}");
            } else {
                eprintln!("error: {e}");
            }
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
