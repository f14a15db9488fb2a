//! Map parsed arguments to an `Action`.

use crate::cli::{
    actions::{Action, passcode, server},
    commands::{self, logging::ARG_VERBOSITY},
    globals::GlobalArgs,
};
use crate::daemon::StatePaths;
use anyhow::{Context, Result, bail};
use clap::parser::ValueSource;
use std::path::PathBuf;

/// # Errors
/// Returns an error if the state directory cannot be determined or a
/// subcommand is missing its arguments.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let Some((name, sub)) = matches.subcommand() else {
        bail!("missing subcommand");
    };

    let globals = globals(sub)?;

    match name {
        commands::CMD_START => Ok(Action::Start(server::Args {
            globals,
            options: commands::server::Options::parse(sub)?,
        })),
        commands::CMD_RESTART => Ok(Action::Restart(server::Args {
            globals,
            options: commands::server::Options::parse(sub)?,
        })),
        commands::CMD_STOP => Ok(Action::Stop(globals)),
        commands::CMD_STATUS => Ok(Action::Status(globals)),
        commands::CMD_SET_PASSCODE => Ok(Action::SetPasscode(passcode::Args {
            globals,
            path: sub
                .get_one::<PathBuf>("path")
                .cloned()
                .context("missing required argument: <path>")?,
        })),
        other => bail!("unknown subcommand: {other}"),
    }
}

// Global args are propagated to the subcommand matches.
fn globals(matches: &clap::ArgMatches) -> Result<GlobalArgs> {
    let state_dir = match matches.get_one::<PathBuf>(commands::ARG_STATE_DIR) {
        Some(dir) => dir.clone(),
        None => StatePaths::from_home()
            .map(|paths| paths.root().to_path_buf())
            .context("Cannot determine home directory; use --state-dir")?,
    };
    // The daemon changes directory to `/` before it writes its PID file.
    let state_dir = std::env::current_dir()
        .context("Cannot determine current directory")?
        .join(state_dir);

    let mut globals = GlobalArgs::new(state_dir);
    // `-v` counts from zero even when absent; only explicit values count.
    if matches!(
        matches.value_source(ARG_VERBOSITY),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    ) {
        if let Some(verbosity) = matches.get_one::<u8>(ARG_VERBOSITY) {
            globals = globals.with_verbosity(*verbosity);
        }
    }

    Ok(globals)
}
