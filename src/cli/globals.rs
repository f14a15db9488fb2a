use crate::daemon::{DaemonManager, StatePaths};
use std::path::PathBuf;
use tracing::Level;

/// Options accepted by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    pub state_dir: PathBuf,
    /// Explicit level from `-v` or `DEMO_SERVER_LOG_LEVEL`; `None` when
    /// neither was given.
    pub verbosity: Option<u8>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            state_dir,
            verbosity: None,
        }
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = Some(verbosity);
        self
    }

    /// Map verbosity to tracing level; `None` keeps the default.
    #[must_use]
    pub const fn log_level(&self) -> Option<Level> {
        match self.verbosity {
            None => None,
            Some(0) => Some(Level::ERROR),
            Some(1) => Some(Level::WARN),
            Some(2) => Some(Level::INFO),
            Some(3) => Some(Level::DEBUG),
            Some(_) => Some(Level::TRACE),
        }
    }

    #[must_use]
    pub fn state_paths(&self) -> StatePaths {
        StatePaths::new(&self.state_dir)
    }

    #[must_use]
    pub fn daemon(&self) -> DaemonManager {
        DaemonManager::new(self.state_paths())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(PathBuf::from("/tmp/state"));
        assert_eq!(args.verbosity, None);
        assert_eq!(args.log_level(), None);
        assert_eq!(
            args.daemon().paths().pid_file(),
            PathBuf::from("/tmp/state/daemon.pid")
        );
    }

    #[test]
    fn test_log_levels() {
        let args = GlobalArgs::new(PathBuf::from("/tmp/state"));
        let levels: Vec<_> = (0..=5)
            .map(|v| args.clone().with_verbosity(v).log_level())
            .collect();
        assert_eq!(
            levels,
            vec![
                Some(Level::ERROR),
                Some(Level::WARN),
                Some(Level::INFO),
                Some(Level::DEBUG),
                Some(Level::TRACE),
                Some(Level::TRACE),
            ]
        );
    }
}
