// src/engine/cancel.rs
use std::time::Duration;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Turns a user interrupt into run-wide cancellation.
///
/// The token is handed to the worker pool at creation; every job watches it
/// and tears down its own process group when it fires.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
}

impl CancellationController {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the run on the first Ctrl-C
    pub fn install_interrupt_handler(&self) -> JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => {
                        warn!("Interrupt received, terminating all jobs");
                        token.cancel();
                    }
                    Err(e) => warn!("Failed to listen for interrupt: {}", e),
                },
                _ = token.cancelled() => {}
            }
        })
    }
}

/// Send `signal` to every process in the group led by `pgid`
pub fn signal_process_group(pgid: u32, signal: Signal) {
    let Ok(raw) = i32::try_from(pgid) else {
        warn!("Process group id {} out of range", pgid);
        return;
    };

    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) => debug!("Sent {:?} to process group {}", signal, pgid),
        // group already gone
        Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to send {:?} to process group {}: {}", signal, pgid, e),
    }
}

/// Terminate a job's whole process group and reap its leader.
///
/// SIGTERM first; after `grace` the group gets SIGKILL so that grandchildren
/// which outlived the leader are swept as well.
pub async fn terminate_job(child: &mut Child, pgid: Option<u32>, grace: Duration) {
    let Some(pgid) = pgid else {
        // already reaped
        return;
    };

    signal_process_group(pgid, Signal::SIGTERM);

    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        warn!("Process group {} ignored SIGTERM for {:?}", pgid, grace);
    }

    signal_process_group(pgid, Signal::SIGKILL);

    if let Err(e) = child.wait().await {
        warn!("Failed to reap process {}: {}", pgid, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_clones_share_token() {
        let controller = CancellationController::new();
        let token = controller.token();
        let child = token.child_token();

        assert!(!controller.is_cancelled());
        controller.clone().cancel();

        assert!(token.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn test_terminate_job_kills_the_group() {
        use std::os::unix::process::CommandExt;

        let mut std_cmd = std::process::Command::new("sh");
        std_cmd.arg("-c").arg("sleep 30 & sleep 30; wait").process_group(0);
        let mut child = tokio::process::Command::from(std_cmd).spawn().unwrap();
        let pgid = child.id();

        terminate_job(&mut child, pgid, Duration::from_secs(2)).await;

        let status = child.try_wait().unwrap().expect("leader reaped");
        assert!(!status.success());
    }

    #[test]
    fn test_signal_missing_group_is_ignored() {
        // above any pid_max
        signal_process_group(2_000_000_000, Signal::SIGTERM);
    }
}
