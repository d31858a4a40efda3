use std::path::Path;

use sandbox::SandboxError;
use tracing::debug;

use crate::command::{CommandError, exec};

/// Verify the Docker CLI is installed and the daemon answers.
///
/// The server version query fails both when the daemon is down and when the
/// current user may not talk to its socket; the two are told apart so the
/// caller can report `PermissionDenied` separately.
pub async fn check_prerequisites(binary: &Path) -> Result<(), SandboxError> {
    which::which(binary).map_err(|e| {
        SandboxError::RuntimeUnavailable(format!(
            "docker binary not found ({}): {e}",
            binary.display()
        ))
    })?;

    let version = exec(binary, &["version", "--format", "{{.Server.Version}}"])
        .await
        .map_err(classify)?;
    debug!(version = %version, "docker daemon reachable");
    Ok(())
}

/// Check for a local image. Any failure other than a permission problem is
/// treated as "not available".
pub async fn image_present(binary: &Path, image: &str) -> Result<bool, SandboxError> {
    match exec(binary, &["image", "inspect", "--format", "{{.Id}}", image]).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_permission_denied() => Err(SandboxError::PermissionDenied(e.detail)),
        Err(e) => {
            debug!(image, detail = %e.detail, "image inspect failed");
            Ok(false)
        }
    }
}

fn classify(err: CommandError) -> SandboxError {
    if err.is_permission_denied() {
        SandboxError::PermissionDenied(err.detail)
    } else if err.spawn_failed {
        SandboxError::RuntimeUnavailable(format!("{}: {}", err.command, err.detail))
    } else {
        SandboxError::RuntimeUnavailable(format!("docker daemon not reachable: {}", err.detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_error(detail: &str, spawn_failed: bool) -> CommandError {
        CommandError {
            command: "docker version".into(),
            detail: detail.into(),
            spawn_failed,
        }
    }

    #[test]
    fn classify_permission_denied() {
        let err = classify(command_error(
            "permission denied while trying to connect to the Docker daemon socket",
            false,
        ));
        assert!(matches!(err, SandboxError::PermissionDenied(_)));
    }

    #[test]
    fn classify_daemon_down() {
        let err = classify(command_error(
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock",
            false,
        ));
        assert!(matches!(err, SandboxError::RuntimeUnavailable(_)));
    }

    #[test]
    fn classify_spawn_failure() {
        let err = classify(command_error("No such file or directory (os error 2)", true));
        assert!(matches!(err, SandboxError::RuntimeUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_runtime_unavailable() {
        let err = check_prerequisites(Path::new("/nonexistent/docker"))
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::RuntimeUnavailable(_)), "{err}");
    }
}
