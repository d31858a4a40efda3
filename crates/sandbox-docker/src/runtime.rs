use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nix::unistd::Pid;
use sandbox::{IsolationRuntime, RunOutput, RunSpec, SandboxError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::command::exec_ignore_errors;
use crate::config::DockerConfig;
use crate::prerequisites::{check_prerequisites, image_present};
use crate::process::{exit_code_of, kill_process_group, process_group_of};

/// Marker the Docker CLI prints when the daemon socket refuses the caller.
const DAEMON_PERMISSION_DENIED: &str = "permission denied while trying to connect";
/// Upper bound on waiting for `docker rm -f` during teardown. A removal still
/// running after this continues in the background.
const REMOVE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct DockerRuntime {
    config: DockerConfig,
}

impl DockerRuntime {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    /// Build the `docker run` argument list for a run.
    ///
    /// All options precede the image; anything after the image is the
    /// container command.
    pub fn build_run_args(spec: &RunSpec) -> sandbox::Result<Vec<String>> {
        if spec.limits.cpus <= 0.0 || !spec.limits.cpus.is_finite() {
            return Err(SandboxError::InvalidConfig(format!(
                "cpus must be positive, got {}",
                spec.limits.cpus
            )));
        }

        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--name".into(),
            spec.name.clone(),
            "--network".into(),
            spec.network.as_str().into(),
            "--cpus".into(),
            spec.limits.cpus.to_string(),
            "--memory".into(),
            format!("{}m", spec.limits.memory_mb),
            "--security-opt".into(),
            "no-new-privileges".into(),
        ];

        if let Some(env_file) = &spec.env_file {
            args.push("--env-file".into());
            args.push(env_file.display().to_string());
        }

        for mount in &spec.mounts {
            let source = mount.host_path.display().to_string();
            if source.contains(',') || mount.container_path.contains(',') {
                return Err(SandboxError::InvalidConfig(format!(
                    "mount paths may not contain ',': {source}"
                )));
            }
            let mut value = format!("type=bind,source={source},target={}", mount.container_path);
            if mount.read_only {
                value.push_str(",readonly");
            }
            args.push("--mount".into());
            args.push(value);
        }

        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        Ok(args)
    }
}

/// Tears a run down if the waiting future is dropped before the run ends.
///
/// Cancelling `run` (e.g. the caller's task is aborted) must not leave a
/// container or a docker client behind.
struct RunGuard {
    binary: PathBuf,
    name: String,
    pgid: Option<Pid>,
    armed: bool,
}

impl RunGuard {
    /// Kill the client's process group, then force-remove the container.
    async fn teardown(&mut self) {
        self.armed = false;
        if let Some(pgid) = self.pgid {
            kill_process_group(pgid);
        }
        let args = ["rm", "-f", &self.name];
        let remove = exec_ignore_errors(&self.binary, &args);
        if tokio::time::timeout(REMOVE_TIMEOUT, remove).await.is_err() {
            warn!(name = %self.name, "container removal still pending, not waiting");
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(pgid) = self.pgid {
            kill_process_group(pgid);
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let binary = self.binary.clone();
            let name = std::mem::take(&mut self.name);
            handle.spawn(async move {
                exec_ignore_errors(&binary, &["rm", "-f", &name]).await;
            });
        }
    }
}

const READ_CHUNK: usize = 8 * 1024;

/// The last `limit` bytes of a stream and a count of what was dropped
/// before them. Memory stays within roughly twice the limit.
#[derive(Debug)]
struct Tail {
    buf: Vec<u8>,
    dropped: u64,
    limit: usize,
}

impl Tail {
    fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            dropped: 0,
            limit,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.limit.saturating_mul(2).max(READ_CHUNK) {
            self.compact();
        }
    }

    fn compact(&mut self) {
        let excess = self.buf.len().saturating_sub(self.limit);
        if excess > 0 {
            self.buf.drain(..excess);
            self.dropped += excess as u64;
        }
    }

    fn into_string(mut self) -> String {
        self.compact();
        let text = String::from_utf8_lossy(&self.buf);
        if self.dropped == 0 {
            text.into_owned()
        } else {
            format!("[... {} bytes truncated]\n{text}", self.dropped)
        }
    }
}

fn capture<R>(reader: Option<R>, limit: usize) -> JoinHandle<Tail>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = Tail::new(limit);
        let Some(mut reader) = reader else {
            return tail;
        };
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    if let Some(bytes) = chunk.get(..n) {
                        tail.push(bytes);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to read run output");
                    break;
                }
            }
        }
        if tail.dropped > 0 || tail.buf.len() > limit {
            warn!(limit, "run output exceeded capture limit, keeping the tail");
        }
        tail
    })
}

async fn collect(handle: JoinHandle<Tail>) -> String {
    handle.await.map(Tail::into_string).unwrap_or_default()
}

#[async_trait]
impl IsolationRuntime for DockerRuntime {
    fn name(&self) -> &str {
        "docker"
    }

    async fn check_runtime(&self) -> sandbox::Result<()> {
        check_prerequisites(&self.config.binary).await
    }

    async fn image_exists(&self, image: &str) -> sandbox::Result<bool> {
        image_present(&self.config.binary, image).await
    }

    async fn run(&self, spec: &RunSpec) -> sandbox::Result<RunOutput> {
        let args = Self::build_run_args(spec)?;

        let mut child = tokio::process::Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    SandboxError::PermissionDenied(format!("spawn docker: {e}"))
                }
                std::io::ErrorKind::NotFound => {
                    SandboxError::RuntimeUnavailable(format!("spawn docker: {e}"))
                }
                _ => SandboxError::LaunchFailed(format!("spawn docker: {e}")),
            })?;

        let mut guard = RunGuard {
            binary: self.config.binary.clone(),
            name: spec.name.clone(),
            pgid: process_group_of(&child),
            armed: true,
        };
        info!(name = %spec.name, image = %spec.image, "container started");

        let stdout = capture(child.stdout.take(), self.config.output_limit);
        let stderr = capture(child.stderr.take(), self.config.output_limit);

        let waited = tokio::time::timeout(spec.timeout, child.wait()).await;
        match waited {
            Ok(Ok(status)) => {
                guard.disarm();
                let exit_code = exit_code_of(status);
                let stdout = collect(stdout).await;
                let stderr = collect(stderr).await;
                info!(name = %spec.name, exit_code, "container exited");

                if exit_code != 0 && stderr.to_ascii_lowercase().contains(DAEMON_PERMISSION_DENIED)
                {
                    return Err(SandboxError::PermissionDenied(stderr.trim().to_string()));
                }

                Ok(RunOutput {
                    exit_code,
                    stdout,
                    stderr,
                })
            }
            Ok(Err(e)) => {
                guard.teardown().await;
                let _ = child.wait().await;
                stdout.abort();
                stderr.abort();
                Err(SandboxError::Io(e))
            }
            Err(_) => {
                warn!(
                    name = %spec.name,
                    timeout_secs = spec.timeout.as_secs(),
                    "deadline exceeded, killing run"
                );
                guard.teardown().await;
                // Reap the client so nothing of this run outlives the call.
                let _ = child.wait().await;
                stdout.abort();
                stderr.abort();
                Err(SandboxError::Timeout(spec.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sandbox::{Mount, NetworkMode, ResourceLimits};

    use super::*;

    fn spec() -> RunSpec {
        RunSpec {
            name: "coderun-test".into(),
            image: "py-runtime".into(),
            mounts: vec![Mount {
                host_path: PathBuf::from("/tmp/staged.py"),
                container_path: "/app/code.py".into(),
                read_only: true,
            }],
            env_file: Some(PathBuf::from("/etc/coderun/.env")),
            limits: ResourceLimits {
                cpus: 2.0,
                memory_mb: 2048,
            },
            network: NetworkMode::Bridge,
            command: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        let idx = args.iter().position(|a| a == flag)?;
        args.get(idx + 1).map(String::as_str)
    }

    #[test]
    fn run_args_carry_limits_and_network() {
        let args = DockerRuntime::build_run_args(&spec()).unwrap();
        assert_eq!(args[0], "run");
        assert!(args.contains(&"--rm".to_string()));
        assert_eq!(value_after(&args, "--name"), Some("coderun-test"));
        assert_eq!(value_after(&args, "--network"), Some("bridge"));
        assert_eq!(value_after(&args, "--cpus"), Some("2"));
        assert_eq!(value_after(&args, "--memory"), Some("2048m"));
        assert_eq!(value_after(&args, "--security-opt"), Some("no-new-privileges"));
        assert_eq!(value_after(&args, "--env-file"), Some("/etc/coderun/.env"));
        assert!(!args.iter().any(|a| a == "--privileged" || a == "-p" || a == "--publish"));
    }

    #[test]
    fn run_args_mount_code_read_only() {
        let args = DockerRuntime::build_run_args(&spec()).unwrap();
        let mounts: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--mount")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(
            mounts,
            vec!["type=bind,source=/tmp/staged.py,target=/app/code.py,readonly"]
        );
    }

    #[test]
    fn run_args_image_last_without_command() {
        let args = DockerRuntime::build_run_args(&spec()).unwrap();
        assert_eq!(args.last().map(String::as_str), Some("py-runtime"));
    }

    #[test]
    fn run_args_command_follows_image() {
        let mut spec = spec();
        spec.network = NetworkMode::None;
        spec.limits.cpus = 1.5;
        spec.command = vec!["python3".into(), "/app/code.py".into()];
        let args = DockerRuntime::build_run_args(&spec).unwrap();
        let image_idx = args.iter().position(|a| a == "py-runtime").unwrap();
        assert_eq!(&args[image_idx + 1..], &["python3", "/app/code.py"]);
        assert_eq!(value_after(&args, "--network"), Some("none"));
        assert_eq!(value_after(&args, "--cpus"), Some("1.5"));
    }

    #[test]
    fn run_args_without_env_file() {
        let mut spec = spec();
        spec.env_file = None;
        let args = DockerRuntime::build_run_args(&spec).unwrap();
        assert!(!args.contains(&"--env-file".to_string()));
    }

    #[test]
    fn run_args_reject_non_positive_cpus() {
        let mut spec = spec();
        spec.limits.cpus = 0.0;
        let err = DockerRuntime::build_run_args(&spec).unwrap_err();
        assert!(matches!(err, SandboxError::InvalidConfig(_)));
    }

    #[test]
    fn tail_keeps_short_output_whole() {
        let mut tail = Tail::new(16);
        tail.push(b"hello\n");
        assert_eq!(tail.into_string(), "hello\n");
    }

    #[test]
    fn tail_keeps_last_bytes_and_notes_truncation() {
        let mut tail = Tail::new(4);
        tail.push(b"abcdef");
        tail.push(b"gh");
        assert_eq!(tail.into_string(), "[... 4 bytes truncated]\nefgh");
    }

    #[test]
    fn tail_memory_is_bounded() {
        let mut tail = Tail::new(1024);
        for _ in 0..10_000 {
            tail.push(&[b'x'; 1000]);
            assert!(tail.buf.len() <= 2 * 1024 + READ_CHUNK + 1000);
        }
        assert_eq!(tail.dropped + tail.buf.len() as u64, 10_000_000);
    }

    #[test]
    fn run_args_reject_comma_in_mount() {
        let mut spec = spec();
        spec.mounts[0].host_path = PathBuf::from("/tmp/a,b.py");
        let err = DockerRuntime::build_run_args(&spec).unwrap_err();
        assert!(matches!(err, SandboxError::InvalidConfig(_)));
    }
}
