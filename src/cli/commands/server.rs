//! Options shared by `start` and `restart`.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command, builder::BoolishValueParser};
use std::path::PathBuf;

use crate::auth::{rate_limit, token};

pub const ARG_PATH: &str = "path";
pub const ARG_PORT: &str = "port";
pub const ARG_PUBLIC: &str = "public";
pub const ARG_FOREGROUND: &str = "foreground";
pub const ARG_TRUST_PROXY_HEADERS: &str = "trust-proxy-headers";
pub const ARG_AUTH_MAX_ATTEMPTS: &str = "auth-max-attempts";
pub const ARG_AUTH_WINDOW_SECONDS: &str = "auth-window-seconds";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";

pub const DEFAULT_PORT: u16 = 5566;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub path: PathBuf,
    pub port: u16,
    pub public: bool,
    pub foreground: bool,
    pub trust_proxy_headers: bool,
    pub auth_max_attempts: usize,
    pub auth_window_seconds: u64,
    pub session_ttl_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the content path is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let path = matches
            .get_one::<PathBuf>(ARG_PATH)
            .cloned()
            .context("missing required argument: <path>")?;

        let auth_max_attempts = matches
            .get_one::<u64>(ARG_AUTH_MAX_ATTEMPTS)
            .copied()
            .map_or(rate_limit::DEFAULT_MAX_ATTEMPTS, |attempts| {
                usize::try_from(attempts).unwrap_or(usize::MAX)
            });

        Ok(Self {
            path,
            port: matches
                .get_one::<u16>(ARG_PORT)
                .copied()
                .unwrap_or(DEFAULT_PORT),
            public: matches.get_flag(ARG_PUBLIC),
            foreground: matches.get_flag(ARG_FOREGROUND),
            trust_proxy_headers: matches.get_flag(ARG_TRUST_PROXY_HEADERS),
            auth_max_attempts,
            auth_window_seconds: matches
                .get_one::<u64>(ARG_AUTH_WINDOW_SECONDS)
                .copied()
                .unwrap_or(rate_limit::DEFAULT_WINDOW.as_secs()),
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(token::DEFAULT_MAX_AGE_SECONDS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PATH)
                .help("Directory whose subdirectories are served as modules")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("5566")
                .env("DEMO_SERVER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_PUBLIC)
                .long("public")
                .help("Listen on all interfaces (0.0.0.0) instead of 127.0.0.1")
                .env("DEMO_SERVER_PUBLIC")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_FOREGROUND)
                .long("foreground")
                .help("Do not detach from the terminal")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY_HEADERS)
                .long("trust-proxy-headers")
                .help("Identify clients by X-Forwarded-For / X-Real-IP (only behind a trusted proxy)")
                .env("DEMO_SERVER_TRUST_PROXY_HEADERS")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_AUTH_MAX_ATTEMPTS)
                .long("auth-max-attempts")
                .help("Passcode attempts allowed per client and module within the window")
                .default_value("5")
                .env("DEMO_SERVER_AUTH_MAX_ATTEMPTS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_AUTH_WINDOW_SECONDS)
                .long("auth-window-seconds")
                .help("Length of the passcode rate-limit window in seconds")
                .default_value("60")
                .env("DEMO_SERVER_AUTH_WINDOW_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long("session-ttl-seconds")
                .help("Lifetime of a session cookie in seconds")
                .default_value("86400")
                .env("DEMO_SERVER_SESSION_TTL_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
