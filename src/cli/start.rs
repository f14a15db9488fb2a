use crate::cli::{actions::Action, commands, dispatch};
use anyhow::Result;

/// Parse the command line into an `Action`.
///
/// Telemetry is initialized by the action itself: a detached server must set
/// up logging after its output has been redirected.
///
/// # Errors
///
/// Returns an error if action dispatch fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    dispatch::handler(&matches)
}
