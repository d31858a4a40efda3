use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;

/// Process group of a spawned child, captured while the child is still alive.
///
/// Requires the child to have been spawned with `process_group(0)` so that
/// its PGID equals its PID.
pub(crate) fn process_group_of(child: &tokio::process::Child) -> Option<Pid> {
    let pid = child.id()?;
    let pid = i32::try_from(pid).ok()?;
    Some(Pid::from_raw(pid))
}

/// Kill an entire process group via `killpg(SIGKILL)`.
///
/// No-op if the group no longer exists.
pub(crate) fn kill_process_group(pgid: Pid) {
    let _ = killpg(pgid, Signal::SIGKILL);
}

/// Exit code for a status, following the shell convention of `128 + signal`
/// for processes terminated by a signal.
pub(crate) fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(sig) => 128 + sig,
        None => 1,
    }
}
