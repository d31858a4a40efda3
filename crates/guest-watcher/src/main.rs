//! guest-watcher: runs inside the execution container.
//!
//! `run -- CMD...` is the container entrypoint. `watch` is the standalone
//! form for setups where something else runs the code and creates the
//! sentinel.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use guest_common::{log_error, log_info};
use guest_watcher::supervise::supervise;
use guest_watcher::{ArtifactWatcher, ObjectStore, S3Config, S3Store, WatcherConfig, WatcherError};
use tokio_util::sync::CancellationToken;

const LOG_TAG: &str = "guest-watcher";

#[derive(Parser)]
#[command(name = "guest-watcher", about = "Upload files written by sandboxed code")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a command with the watcher active, then print the upload report
    Run {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Watch until the sentinel appears or Ctrl-C, then print the upload report
    Watch,
}

async fn build_store() -> Result<Arc<dyn ObjectStore>, WatcherError> {
    let config = S3Config::from_env()?;
    log_info!(LOG_TAG, "Bucket: {}", config.bucket);
    let store = S3Store::new(config).await?;
    Ok(Arc::new(store))
}

async fn run(cli: Cli) -> Result<i32, WatcherError> {
    let config = WatcherConfig::from_env()?;
    let store = build_store().await?;

    match cli.command {
        Command::Run { command } => {
            supervise(&command, config, store, &mut std::io::stdout()).await
        }
        Command::Watch => {
            let cancel = CancellationToken::new();
            let watch = ArtifactWatcher::new(config, store).start(cancel.clone())?;
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });
            let urls = watch.finish().await;
            report_proto::write_report(&mut std::io::stdout(), &urls)?;
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            log_error!(LOG_TAG, "{e}");
            ExitCode::FAILURE
        }
    }
}
