//! Lifecycle of the spawned capture probe. The handle guarantees the child
//! does not outlive the monitor: termination is requested gracefully and
//! forced after a bounded grace period.

use std::{env, path::Path, time::Duration};

use anyhow::{Context, Result};
use sysinfo::{Pid, Signal, System};
use tokio::process::{Child, Command};
use tracing::{info, warn};

pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);
const PROBE_BINARY: &str = "whatnow-probe";

pub struct ProbeProcess {
    child: Child,
}

impl ProbeProcess {
    /// Spawns the probe binary sitting next to the current executable,
    /// pointed at the same application directory.
    pub fn spawn(application_dir: &Path) -> Result<Self> {
        let current = env::current_exe().context("Can't locate the current executable")?;
        let probe = current
            .parent()
            .context("Executable has no parent directory")?
            .join(format!("{PROBE_BINARY}{}", env::consts::EXE_SUFFIX));

        let child = Command::new(&probe)
            .arg("--dir")
            .arg(application_dir)
            .spawn()
            .with_context(|| format!("Failed to spawn capture probe {probe:?}"))?;
        info!("Spawned capture probe (pid {:?})", child.id());
        Ok(Self { child })
    }

    #[cfg(test)]
    fn from_child(child: Child) -> Self {
        Self { child }
    }

    /// Asks the child to terminate, waits out the grace period, then kills.
    pub async fn shutdown(self, grace: Duration) -> Result<()> {
        self.shutdown_inner(grace).await
    }

    async fn shutdown_inner(mut self, grace: Duration) -> Result<()> {
        if let Some(pid) = self.child.id() {
            request_termination(pid);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                info!("Capture probe exited with {:?}", status?);
            }
            Err(_) => {
                warn!("Capture probe ignored termination for {grace:?}, killing it");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

fn request_termination(pid: u32) {
    let system = System::new_all();
    let Some(process) = system.process(Pid::from_u32(pid)) else {
        return;
    };
    // Term is unsupported on Windows, where kill_with returns None and the
    // process gets the forced kill instead.
    if process.kill_with(Signal::Term).is_none() {
        process.kill();
    }
}

#[cfg(all(test, unix))]
mod probe_process_tests {
    use super::*;
    use crate::utils::logging::TEST_LOGGING;

    #[tokio::test]
    async fn cooperative_child_exits_within_grace() -> Result<()> {
        *TEST_LOGGING;
        let child = Command::new("sleep").arg("30").spawn()?;
        let probe = ProbeProcess::from_child(child);

        let start = std::time::Instant::now();
        probe.shutdown(Duration::from_secs(5)).await?;
        assert!(start.elapsed() < Duration::from_secs(2));
        Ok(())
    }

    #[tokio::test]
    async fn stubborn_child_is_force_killed() -> Result<()> {
        *TEST_LOGGING;
        let child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; sleep 30")
            .spawn()?;
        let pid = child.id().unwrap();
        let probe = ProbeProcess::from_child(child);

        probe.shutdown(Duration::from_millis(300)).await?;

        // Process must be gone once shutdown returns.
        let system = System::new_all();
        assert!(system.process(Pid::from_u32(pid)).is_none());
        Ok(())
    }
}
