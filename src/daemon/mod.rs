//! Background process lifecycle tracked by a PID file.
//!
//! `start` detaches the current process with the double-fork pattern and must
//! run while the process is still single-threaded, before the Tokio runtime
//! is built.

pub mod paths;

pub use self::paths::StatePaths;

use nix::{
    errno::Errno,
    sys::signal::{Signal, kill},
    unistd::{ForkResult, Pid, dup2, fork, setsid},
};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    os::fd::AsRawFd,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};
use tracing::{debug, info};

/// Pause between stopping the old server and starting the new one, so the
/// listening port is released.
pub const RESTART_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid PID file {path}: {contents:?}")]
    InvalidPidFile { path: PathBuf, contents: String },
    #[error("{call} failed: {source}")]
    Sys {
        call: &'static str,
        #[source]
        source: Errno,
    },
}

impl DaemonError {
    fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    fn sys(call: &'static str) -> impl FnOnce(Errno) -> Self {
        move |source| Self::Sys { call, source }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DaemonStatus {
    pub pid: Option<i32>,
    pub running: bool,
}

impl DaemonStatus {
    /// A PID file exists but its process is gone.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.pid.is_some() && !self.running
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Signalled(i32),
    Stale(i32),
}

/// What `release` found before a restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Released {
    Idle,
    Stopped(StopOutcome),
    StaleRemoved(i32),
}

#[derive(Clone, Debug)]
pub struct DaemonManager {
    paths: StatePaths,
}

impl DaemonManager {
    #[must_use]
    pub fn new(paths: StatePaths) -> Self {
        Self { paths }
    }

    #[must_use]
    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    /// Detach from the terminal and record the daemon PID.
    ///
    /// Returns in the detached grandchild; the original process and the
    /// intermediate child exit with status 0. Stdin is read from `/dev/null`
    /// and stdout/stderr append to the server log.
    ///
    /// # Errors
    /// Returns an error if the log cannot be opened, a system call fails or
    /// the PID file cannot be written.
    #[allow(unsafe_code)]
    pub fn start(&self) -> Result<(), DaemonError> {
        let root = self.paths.root();
        self.paths
            .ensure_dirs()
            .map_err(DaemonError::io("create", root))?;

        // Opened up front so failures are still reported on the terminal.
        let log_path = self.paths.log_file();
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(DaemonError::io("open", &log_path))?;
        let null_path = Path::new("/dev/null");
        let null = File::open(null_path).map_err(DaemonError::io("open", null_path))?;

        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        // SAFETY: called from the synchronous entry point before any runtime
        // or worker thread exists, so the child inherits a single thread.
        match unsafe { fork() }.map_err(DaemonError::sys("fork"))? {
            ForkResult::Parent { .. } => std::process::exit(0),
            ForkResult::Child => {}
        }

        setsid().map_err(DaemonError::sys("setsid"))?;

        // SAFETY: still single-threaded; the first child only has the thread
        // that called fork.
        match unsafe { fork() }.map_err(DaemonError::sys("fork"))? {
            ForkResult::Parent { .. } => std::process::exit(0),
            ForkResult::Child => {}
        }

        std::env::set_current_dir("/").map_err(DaemonError::io("chdir", Path::new("/")))?;

        dup2(null.as_raw_fd(), nix::libc::STDIN_FILENO).map_err(DaemonError::sys("dup2"))?;
        dup2(log.as_raw_fd(), nix::libc::STDOUT_FILENO).map_err(DaemonError::sys("dup2"))?;
        dup2(log.as_raw_fd(), nix::libc::STDERR_FILENO).map_err(DaemonError::sys("dup2"))?;

        self.write_pid_file(std::process::id())
    }

    /// Atomically replace the PID file with `pid`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_pid_file(&self, pid: u32) -> Result<(), DaemonError> {
        self.paths
            .ensure_dirs()
            .map_err(DaemonError::io("create", self.paths.root()))?;
        let path = self.paths.pid_file();
        let tmp = path.with_extension("pid.tmp");
        fs::write(&tmp, format!("{pid}\n")).map_err(DaemonError::io("write", &tmp))?;
        fs::rename(&tmp, &path).map_err(DaemonError::io("rename", &path))?;
        debug!("Wrote PID {pid} to {}", path.display());
        Ok(())
    }

    /// PID recorded in the PID file, if any.
    ///
    /// # Errors
    /// Returns an error if the file is unreadable or does not hold a positive
    /// integer.
    pub fn read_pid(&self) -> Result<Option<i32>, DaemonError> {
        let path = self.paths.pid_file();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(DaemonError::io("read", &path)(err)),
        };
        // 0 and negative values address process groups, never a single PID.
        match contents.trim().parse::<i32>() {
            Ok(pid) if pid > 0 => Ok(Some(pid)),
            _ => Err(DaemonError::InvalidPidFile { path, contents }),
        }
    }

    /// # Errors
    /// Returns an error if the PID file is unreadable or invalid, or the
    /// liveness probe fails for a reason other than `ESRCH`/`EPERM`.
    pub fn status(&self) -> Result<DaemonStatus, DaemonError> {
        let Some(pid) = self.read_pid()? else {
            return Ok(DaemonStatus {
                pid: None,
                running: false,
            });
        };
        Ok(DaemonStatus {
            pid: Some(pid),
            running: is_alive(pid)?,
        })
    }

    /// Send SIGTERM to the recorded PID. The PID file is removed afterwards
    /// whatever the outcome.
    ///
    /// # Errors
    /// Returns an error if the PID file is invalid or the signal cannot be
    /// delivered for a reason other than `ESRCH`.
    pub fn stop(&self) -> Result<StopOutcome, DaemonError> {
        let pid = match self.read_pid() {
            Ok(Some(pid)) => pid,
            Ok(None) => return Ok(StopOutcome::NotRunning),
            Err(err) => {
                self.remove_pid_file()?;
                return Err(err);
            }
        };

        let outcome = match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => {
                info!("Sent SIGTERM to {pid}");
                Ok(StopOutcome::Signalled(pid))
            }
            Err(Errno::ESRCH) => Ok(StopOutcome::Stale(pid)),
            Err(err) => Err(DaemonError::sys("kill")(err)),
        };

        self.remove_pid_file()?;
        outcome
    }

    /// Stop a running server or clear a stale PID file, waiting
    /// [`RESTART_GRACE`] after a stop.
    ///
    /// # Errors
    /// See [`DaemonManager::status`] and [`DaemonManager::stop`].
    pub fn release(&self) -> Result<Released, DaemonError> {
        let status = self.status()?;
        if status.running {
            let outcome = self.stop()?;
            thread::sleep(RESTART_GRACE);
            return Ok(Released::Stopped(outcome));
        }
        if let Some(pid) = status.pid {
            self.remove_pid_file()?;
            return Ok(Released::StaleRemoved(pid));
        }
        Ok(Released::Idle)
    }

    /// `release` followed by `start`. `report` sees what was released while
    /// the terminal is still attached.
    ///
    /// # Errors
    /// See [`DaemonManager::release`] and [`DaemonManager::start`].
    pub fn restart(&self, report: impl FnOnce(Released)) -> Result<(), DaemonError> {
        let released = self.release()?;
        report(released);
        self.start()
    }

    /// # Errors
    /// Returns an error if an existing PID file cannot be removed.
    pub fn remove_pid_file(&self) -> Result<(), DaemonError> {
        let path = self.paths.pid_file();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(DaemonError::io("remove", &path)(err)),
        }
    }

    /// Remove the PID file only if it still names `pid`. A newer server may
    /// already have replaced it.
    ///
    /// # Errors
    /// See [`DaemonManager::read_pid`] and [`DaemonManager::remove_pid_file`].
    pub fn release_pid_file(&self, pid: u32) -> Result<bool, DaemonError> {
        let owned = self
            .read_pid()?
            .is_some_and(|recorded| u32::try_from(recorded).is_ok_and(|recorded| recorded == pid));
        if owned {
            self.remove_pid_file()?;
        }
        Ok(owned)
    }
}

/// Probe `pid` with signal 0. `EPERM` means the process exists under another
/// user.
fn is_alive(pid: i32) -> Result<bool, DaemonError> {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(err) => Err(DaemonError::sys("kill")(err)),
    }
}
