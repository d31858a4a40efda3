//! Container entrypoint logic: run user code with the watcher active, then
//! signal completion and print the upload report.

use std::io::Write;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use guest_common::{log_info, log_warn};
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::WatcherConfig;
use crate::error::WatcherError;
use crate::store::ObjectStore;
use crate::watch::ArtifactWatcher;

const LOG_TAG: &str = "supervisor";

/// Shell convention: `128 + signal` for signal-terminated processes.
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    use std::os::unix::process::ExitStatusExt;
    status.signal().map_or(1, |sig| 128 + sig)
}

/// Hidden, so the upload filter skips it.
fn run_sentinel_name() -> String {
    format!(".done-{}", Uuid::new_v4().simple())
}

/// Run `command` in the watch directory and return its exit code.
///
/// The command gets its own process group with inherited stdio. Once it
/// exits, any processes it left behind are killed, the sentinel is created
/// and the report is written to `out` after the watcher has drained. The
/// report is therefore always the last thing on stdout.
///
/// The sentinel name is fresh for every run, so files the command creates
/// can never end the watch early.
pub async fn supervise<W: Write>(
    command: &[String],
    mut config: WatcherConfig,
    store: Arc<dyn ObjectStore>,
    out: &mut W,
) -> Result<i32, WatcherError> {
    let (program, args) = command.split_first().ok_or(WatcherError::EmptyCommand)?;
    config.sentinel = run_sentinel_name();
    let sentinel = config.sentinel_path();
    let workdir = config.watch_dir.clone();

    let cancel = CancellationToken::new();
    let watch = ArtifactWatcher::new(config, store).start(cancel.clone())?;

    let spawned = tokio::process::Command::new(program)
        .args(args)
        .current_dir(&workdir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .process_group(0)
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(source) => {
            cancel.cancel();
            watch.finish().await;
            return Err(WatcherError::Spawn {
                command: command.join(" "),
                source,
            });
        }
    };
    let pgid = child
        .id()
        .and_then(|pid| i32::try_from(pid).ok())
        .map(Pid::from_raw);
    log_info!(LOG_TAG, "Started {program}");

    let status = child.wait().await?;
    let exit_code = exit_code_of(status);
    log_info!(LOG_TAG, "{program} exited with code {exit_code}");

    // Background processes must not outlive the run or write after the report.
    if let Some(pgid) = pgid {
        let _ = killpg(pgid, Signal::SIGKILL);
    }

    if let Err(source) = std::fs::File::create(&sentinel) {
        log_warn!(LOG_TAG, "Could not create {}: {source}", sentinel.display());
        cancel.cancel();
        watch.finish().await;
        return Err(WatcherError::Sentinel {
            path: sentinel,
            source,
        });
    }

    let urls = watch.finish().await;
    let _ = std::fs::remove_file(&sentinel);
    report_proto::write_report(out, &urls)?;
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_of_signal() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code_of(ExitStatus::from_raw(9)), 137);
        assert_eq!(exit_code_of(ExitStatus::from_raw(3 << 8)), 3);
    }

    #[test]
    fn run_sentinel_is_hidden_and_unique() {
        let a = run_sentinel_name();
        let b = run_sentinel_name();
        assert!(a.starts_with(".done-"), "{a}");
        assert_ne!(a, b);
        assert!(crate::filter::IgnoreFilter::default().is_ignored(&a));
    }
}
