use crate::{
    cli::globals::GlobalArgs,
    daemon::{DaemonManager, DaemonStatus, StopOutcome},
};
use anyhow::{Context, Result};

/// Handle `stop`.
///
/// # Errors
/// Returns an error if the PID file is invalid or the process cannot be
/// signalled.
pub fn stop(globals: &GlobalArgs) -> Result<()> {
    let outcome = globals.daemon().stop().context("Failed to stop server")?;
    println!("{}", describe_stop(outcome));
    Ok(())
}

/// Handle `status`. A stale PID file is removed after it is reported.
///
/// # Errors
/// Returns an error if the PID file cannot be read or removed.
pub fn status(globals: &GlobalArgs) -> Result<()> {
    let manager = globals.daemon();
    let status = manager.status().context("Failed to read server status")?;
    println!("{}", describe_status(&manager, status));
    if status.is_stale() {
        manager
            .remove_pid_file()
            .context("Failed to remove stale PID file")?;
    }
    Ok(())
}

#[must_use]
pub fn describe_stop(outcome: StopOutcome) -> String {
    match outcome {
        StopOutcome::NotRunning => "Server is not running".to_string(),
        StopOutcome::Signalled(pid) => format!("Server stopped (PID {pid})"),
        StopOutcome::Stale(pid) => {
            format!("Server process {pid} not found; removed stale PID file")
        }
    }
}

#[must_use]
pub fn describe_status(manager: &DaemonManager, status: DaemonStatus) -> String {
    match status {
        DaemonStatus {
            pid: Some(pid),
            running: true,
        } => format!(
            "Server is running (PID {pid})\nLogs: {}",
            manager.paths().log_file().display()
        ),
        DaemonStatus {
            pid: Some(pid),
            running: false,
        } => format!("Server is not running (stale PID file for {pid}, removing it)"),
        DaemonStatus { pid: None, .. } => "Server is not running".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn stop_messages() {
        assert_eq!(describe_stop(StopOutcome::NotRunning), "Server is not running");
        assert_eq!(
            describe_stop(StopOutcome::Signalled(42)),
            "Server stopped (PID 42)"
        );
        assert!(describe_stop(StopOutcome::Stale(42)).contains("stale"));
    }

    #[test]
    fn status_messages() {
        let manager = GlobalArgs::new(PathBuf::from("/tmp/state")).daemon();
        let running = describe_status(
            &manager,
            DaemonStatus {
                pid: Some(7),
                running: true,
            },
        );
        assert!(running.starts_with("Server is running (PID 7)"));
        assert!(running.contains("/tmp/state/logs/server.log"));
        assert!(
            describe_status(
                &manager,
                DaemonStatus {
                    pid: Some(7),
                    running: false
                }
            )
            .contains("stale")
        );
    }

    #[test]
    fn status_removes_stale_pid_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let globals = GlobalArgs::new(dir.path().to_path_buf());
        // Spawn and reap a child so its PID is known to be free.
        let mut child = std::process::Command::new("true").spawn()?;
        let pid = child.id();
        child.wait()?;
        globals.daemon().write_pid_file(pid)?;

        status(&globals)?;
        assert!(!globals.daemon().paths().pid_file().exists());
        Ok(())
    }
}
