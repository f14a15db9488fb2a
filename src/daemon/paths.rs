//! Layout of the per-user state directory (`~/.demo-server`).

use std::{
    fs::{self, DirBuilder},
    io,
    os::unix::fs::DirBuilderExt,
    path::{Path, PathBuf},
};

pub const STATE_DIR_NAME: &str = ".demo-server";
const SECRET_FILE: &str = ".secret";
const PID_FILE: &str = "daemon.pid";
const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "server.log";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.demo-server`, if the home directory can be determined.
    #[must_use]
    pub fn from_home() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(STATE_DIR_NAME)))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn secret_file(&self) -> PathBuf {
        self.root.join(SECRET_FILE)
    }

    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        self.root.join(PID_FILE)
    }

    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR)
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.log_dir().join(LOG_FILE)
    }

    /// Create the state and log directories (mode 700 when newly created).
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(self.log_dir())?;
        // Recursive creation leaves an existing root untouched.
        if fs::metadata(&self.root)?.is_dir() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", self.root.display()),
            ))
        }
    }
}
