pub mod logging;
pub mod server;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

pub const ARG_STATE_DIR: &str = "state-dir";

pub const CMD_START: &str = "start";
pub const CMD_STOP: &str = "stop";
pub const CMD_STATUS: &str = "status";
pub const CMD_RESTART: &str = "restart";
pub const CMD_SET_PASSCODE: &str = "set-passcode";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("demo-server")
        .about("Static module server with optional passcode protection")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_STATE_DIR)
                .long("state-dir")
                .help("Directory holding the PID file, logs and signing secret (default: ~/.demo-server)")
                .env("DEMO_SERVER_HOME")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand(server::with_args(
            Command::new(CMD_START).about("Start the server in the background"),
        ))
        .subcommand(Command::new(CMD_STOP).about("Stop the background server"))
        .subcommand(Command::new(CMD_STATUS).about("Show whether the server is running"))
        .subcommand(server::with_args(
            Command::new(CMD_RESTART).about("Stop the server if running, then start it"),
        ))
        .subcommand(
            Command::new(CMD_SET_PASSCODE)
                .about("Protect a module directory with a passcode")
                .arg(
                    Arg::new("path")
                        .help("Module directory to protect")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        );

    logging::with_args(command)
}
