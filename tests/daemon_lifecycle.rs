//! PID-file lifecycle against real processes.

use anyhow::Result;
use demo_server::daemon::{DaemonManager, Released, StatePaths, StopOutcome};
use std::{
    process::{Child, Command, Stdio},
    time::{Duration, Instant},
};

struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn manager() -> Result<(tempfile::TempDir, DaemonManager)> {
    let dir = tempfile::tempdir()?;
    let manager = DaemonManager::new(StatePaths::new(dir.path().join("state")));
    Ok((dir, manager))
}

fn dead_pid() -> Result<u32> {
    let mut child = Command::new("true").spawn()?;
    let pid = child.id();
    child.wait()?;
    Ok(pid)
}

#[test]
fn live_process_is_running() -> Result<()> {
    let (_dir, manager) = manager()?;
    manager.write_pid_file(std::process::id())?;

    let status = manager.status()?;
    assert!(status.running);
    assert_eq!(status.pid, i32::try_from(std::process::id()).ok());
    Ok(())
}

#[test]
fn process_owned_by_another_user_counts_as_running() -> Result<()> {
    // PID 1 always exists; unprivileged callers get EPERM from the probe.
    let (_dir, manager) = manager()?;
    manager.write_pid_file(1)?;
    assert!(manager.status()?.running);
    Ok(())
}

#[test]
fn dead_process_is_stale() -> Result<()> {
    let (_dir, manager) = manager()?;
    let pid = dead_pid()?;
    manager.write_pid_file(pid)?;

    let status = manager.status()?;
    assert!(!status.running);
    assert!(status.is_stale());

    assert_eq!(manager.stop()?, StopOutcome::Stale(i32::try_from(pid)?));
    assert!(!manager.paths().pid_file().exists());
    Ok(())
}

#[test]
fn stop_without_pid_file_is_not_running() -> Result<()> {
    let (_dir, manager) = manager()?;
    assert_eq!(manager.stop()?, StopOutcome::NotRunning);
    Ok(())
}

#[test]
fn stop_signals_a_running_process() -> Result<()> {
    let (_dir, manager) = manager()?;
    let child = Command::new("sleep")
        .arg("30")
        .stdout(Stdio::null())
        .spawn()?;
    let mut guard = ChildGuard(child);
    manager.write_pid_file(guard.0.id())?;

    assert_eq!(
        manager.stop()?,
        StopOutcome::Signalled(i32::try_from(guard.0.id())?)
    );
    assert!(!manager.paths().pid_file().exists());

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut exited = false;
    while Instant::now() < deadline {
        if guard.0.try_wait()?.is_some() {
            exited = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(exited, "child survived SIGTERM");
    Ok(())
}

#[test]
fn release_clears_stale_pid_file() -> Result<()> {
    let (_dir, manager) = manager()?;
    let pid = dead_pid()?;
    manager.write_pid_file(pid)?;

    assert_eq!(manager.release()?, Released::StaleRemoved(i32::try_from(pid)?));
    assert!(!manager.paths().pid_file().exists());
    assert_eq!(manager.release()?, Released::Idle);
    Ok(())
}
