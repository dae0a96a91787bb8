//! Two-phase child termination: ask politely, wait, then force.

use std::process::ExitStatus;
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tokio::process::Child;
use tracing::{debug, warn};

/// How a supervised child ended up stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The child had already exited.
    AlreadyExited(ExitStatus),
    /// The child honored the stop request within the grace period.
    Graceful(ExitStatus),
    /// The child was killed after the grace period.
    Forced,
}

/// Request cooperative shutdown of `child`, wait up to `grace`, then kill.
///
/// # Errors
///
/// Returns error if the child's status cannot be queried or the forced kill
/// fails.
pub async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<Termination> {
    if let Some(status) = child.try_wait()? {
        return Ok(Termination::AlreadyExited(status));
    }

    if child.id().is_some_and(request_stop) {
        if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
            let status = status?;
            debug!(?status, "child stopped gracefully");
            return Ok(Termination::Graceful(status));
        }
        warn!(grace_ms = grace.as_millis(), "child ignored stop request, killing");
    } else {
        debug!("graceful stop unavailable, killing");
    }

    force_kill(child).await?;
    Ok(Termination::Forced)
}

/// Kill `child` immediately and reap it.
///
/// # Errors
///
/// Returns error if the kill signal cannot be delivered.
pub async fn force_kill(child: &mut Child) -> std::io::Result<()> {
    match child.kill().await {
        Ok(()) => Ok(()),
        // already reaped between the check and the kill
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
        Err(e) => Err(e),
    }
}

/// Send the platform's terminate signal. Returns whether it was delivered.
fn request_stop(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid)
        .and_then(|process| process.kill_with(Signal::Term))
        .unwrap_or(false)
}
