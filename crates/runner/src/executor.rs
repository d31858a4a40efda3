//! Runs one piece of untrusted code in an isolated container and turns the
//! outcome into a result or a classified failure.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use sandbox::{IsolationRuntime, Mount, RunOutput, RunSpec};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ExecError;
use crate::masker::{SecretMasker, tail};
use crate::staging::StagedCode;
use crate::types::{ExecutionRequest, ExecutionResult};

/// Where the staged code appears inside the container.
pub const CONTAINER_CODE_PATH: &str = "/app/code.py";
const CONTAINER_NAME_PREFIX: &str = "coderun";
/// Failure details are cut to the last this-many characters of stderr.
const MAX_DETAIL_CHARS: usize = 2000;

pub struct Executor {
    runtime: Arc<dyn IsolationRuntime>,
    staging_dir: Option<PathBuf>,
}

impl Executor {
    pub fn new(runtime: Arc<dyn IsolationRuntime>) -> Self {
        Self {
            runtime,
            staging_dir: None,
        }
    }

    /// Stage code files under `dir` instead of the system temp dir.
    pub fn with_staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.staging_dir = dir;
        self
    }

    /// Check that the runtime answers and `image` is present locally.
    pub async fn preflight(&self, image: &str) -> Result<(), ExecError> {
        self.runtime
            .check_runtime()
            .await
            .map_err(|e| ExecError::from_sandbox(e, image))?;
        debug!(runtime = self.runtime.name(), "runtime available");

        let present = self
            .runtime
            .image_exists(image)
            .await
            .map_err(|e| ExecError::from_sandbox(e, image))?;
        if !present {
            return Err(ExecError::ImageUnavailable {
                image: image.to_string(),
            });
        }
        Ok(())
    }

    /// Run `request` to completion or deadline.
    ///
    /// Nothing is staged or launched unless preflight passes. The staged
    /// file is removed on every path out of this function.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecError> {
        let run_id = Uuid::new_v4();
        self.preflight(&request.image).await?;

        let staged = StagedCode::write(&request.code, self.staging_dir.as_deref()).map_err(|e| {
            ExecError::RuntimeFailure {
                exit_code: -1,
                detail: format!("failed to stage code: {e}"),
            }
        })?;
        debug!(run_id = %run_id, path = %staged.path().display(), "code staged");

        let spec = RunSpec {
            name: format!("{CONTAINER_NAME_PREFIX}-{run_id}"),
            image: request.image.clone(),
            mounts: vec![Mount {
                host_path: staged.path().to_path_buf(),
                container_path: CONTAINER_CODE_PATH.to_string(),
                read_only: true,
            }],
            env_file: request.env_file.clone(),
            limits: request.limits,
            network: request.network,
            command: request.command.clone(),
            timeout: request.timeout,
        };

        info!(
            run_id = %run_id,
            image = %request.image,
            cpus = request.limits.cpus,
            memory_mb = request.limits.memory_mb,
            network = %request.network,
            timeout_secs = request.timeout.as_secs(),
            "starting run"
        );
        let started = Instant::now();
        let output = self.runtime.run(&spec).await.map_err(|e| {
            warn!(run_id = %run_id, error = %e, "run failed");
            ExecError::from_sandbox(e, &request.image)
        })?;
        let elapsed = started.elapsed();
        drop(staged);

        assemble(run_id, request, output, elapsed)
    }
}

fn assemble(
    run_id: Uuid,
    request: &ExecutionRequest,
    output: RunOutput,
    elapsed: std::time::Duration,
) -> Result<ExecutionResult, ExecError> {
    let masker = masker_for(request);
    let stderr = masker.mask_string(&output.stderr);

    if !output.success() {
        warn!(run_id = %run_id, exit_code = output.exit_code, "code exited with failure");
        let trimmed = stderr.trim();
        let detail = if trimmed.is_empty() {
            format!("container exited with code {}", output.exit_code)
        } else {
            tail(trimmed, MAX_DETAIL_CHARS)
        };
        return Err(ExecError::RuntimeFailure {
            exit_code: output.exit_code,
            detail,
        });
    }

    let urls = report_proto::parse_report(&output.stdout);
    if urls.is_empty() {
        warn!(run_id = %run_id, "no URLs found in output");
    }
    info!(
        run_id = %run_id,
        urls = urls.len(),
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "run finished"
    );

    Ok(ExecutionResult {
        urls,
        stdout: masker.mask_string(&output.stdout),
        stderr,
        elapsed,
    })
}

fn masker_for(request: &ExecutionRequest) -> SecretMasker {
    let Some(path) = &request.env_file else {
        return SecretMasker::default();
    };
    match SecretMasker::from_env_file(path) {
        Ok(masker) => masker,
        Err(e) => {
            warn!(env_file = %path.display(), error = %e, "could not read env file for masking");
            SecretMasker::default()
        }
    }
}
