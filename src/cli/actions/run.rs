use super::{Action, daemon, passcode, server};
use crate::cli::telemetry;
use anyhow::Result;

pub(super) fn execute(action: Action) -> Result<()> {
    match action {
        // Telemetry for the server is set up after detaching.
        Action::Start(args) => server::start(args),
        Action::Restart(args) => server::restart(args),
        Action::Stop(globals) => {
            telemetry::init(globals.log_level())?;
            daemon::stop(&globals)
        }
        Action::Status(globals) => {
            telemetry::init(globals.log_level())?;
            daemon::status(&globals)
        }
        Action::SetPasscode(args) => {
            telemetry::init(args.globals.log_level())?;
            passcode::set(&args)
        }
    }
}
