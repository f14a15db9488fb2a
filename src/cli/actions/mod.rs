pub mod daemon;
pub mod passcode;
pub mod server;

use crate::cli::globals::GlobalArgs;

// The match lives in `run` so this file only declares what can be done.
mod run;

#[derive(Debug)]
pub enum Action {
    Start(server::Args),
    Restart(server::Args),
    Stop(GlobalArgs),
    Status(GlobalArgs),
    SetPasscode(passcode::Args),
}

impl Action {
    /// Execute the action.
    ///
    /// `start` and `restart` may fork, so this runs before any Tokio runtime
    /// exists.
    ///
    /// # Errors
    /// Returns an error if the action fails.
    pub fn execute(self) -> anyhow::Result<()> {
        run::execute(self)
    }
}
