use crate::{
    api::{self, AppState},
    auth::{AccessGate, ProcessSecret, SlidingWindowLimiter, TokenService},
    cli::{commands::server::Options, globals::GlobalArgs, telemetry},
    daemon::{DaemonManager, Released},
};
use anyhow::{Context, Result, bail};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct Args {
    pub globals: GlobalArgs,
    pub options: Options,
}

impl Args {
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        let ip = if self.options.public {
            Ipv4Addr::UNSPECIFIED
        } else {
            Ipv4Addr::LOCALHOST
        };
        SocketAddr::new(IpAddr::V4(ip), self.options.port)
    }
}

/// Handle `start`: refuse if a server is running, clear a stale PID file,
/// then detach (unless `--foreground`) and serve.
///
/// # Errors
/// Returns an error if the content path is invalid, a server is already
/// running, or detaching or serving fails.
pub fn start(args: Args) -> Result<()> {
    let base = content_root(&args.options.path)?;
    let manager = args.globals.daemon();

    let status = manager.status().context("Failed to read server status")?;
    if let (true, Some(pid)) = (status.running, status.pid) {
        bail!("Server is already running (PID {pid})");
    }
    if let Some(pid) = status.pid {
        manager.remove_pid_file()?;
        println!("Removed stale PID file for {pid}");
    }

    println!("{}", banner(&args, &base, &manager));
    if args.options.foreground {
        manager.write_pid_file(std::process::id())?;
    } else {
        manager.start().context("Failed to start server in the background")?;
    }

    serve(&manager, &args, &base)
}

/// Handle `restart`: stop a running server (or clear a stale PID file), wait
/// for the port, then start.
///
/// # Errors
/// See [`start`].
pub fn restart(args: Args) -> Result<()> {
    let base = content_root(&args.options.path)?;
    let manager = args.globals.daemon();

    let report = |released: Released| {
        match released {
            Released::Stopped(outcome) => println!("{}", super::daemon::describe_stop(outcome)),
            Released::StaleRemoved(pid) => println!("Removed stale PID file for {pid}"),
            Released::Idle => {}
        }
        println!("{}", banner(&args, &base, &manager));
    };

    if args.options.foreground {
        report(manager.release()?);
        manager.write_pid_file(std::process::id())?;
    } else {
        manager
            .restart(report)
            .context("Failed to restart server in the background")?;
    }

    serve(&manager, &args, &base)
}

fn content_root(path: &Path) -> Result<PathBuf> {
    let base = path
        .canonicalize()
        .with_context(|| format!("Cannot access {}", path.display()))?;
    if !base.is_dir() {
        bail!("{} is not a directory", base.display());
    }
    Ok(base)
}

fn banner(args: &Args, base: &Path, manager: &DaemonManager) -> String {
    let addr = args.bind_addr();
    let mut lines = vec![
        format!("Serving {} at http://{addr}/", base.display()),
        format!("Module index: http://{addr}/all/"),
    ];
    if !args.options.foreground {
        lines.push(format!("Logs: {}", manager.paths().log_file().display()));
        lines.push(format!("PID file: {}", manager.paths().pid_file().display()));
    }
    lines.join("\n")
}

/// Build the shared services for `base`.
///
/// # Errors
/// Returns an error if the signing secret is unavailable or `base` is not a
/// readable directory.
pub fn app_state(args: &Args, base: &Path) -> Result<AppState> {
    let secret = ProcessSecret::load_or_create(&args.globals.state_paths().secret_file())?;
    let limiter = SlidingWindowLimiter::new(
        args.options.auth_max_attempts,
        Duration::from_secs(args.options.auth_window_seconds),
    );
    let gate = AccessGate::new(base, TokenService::new(secret), Arc::new(limiter))
        .with_context(|| format!("Cannot serve {}", base.display()))?
        .with_session_max_age(args.options.session_ttl_seconds);

    Ok(AppState::new(gate).with_trust_proxy_headers(args.options.trust_proxy_headers))
}

fn serve(manager: &DaemonManager, args: &Args, base: &Path) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    let result = runtime.block_on(async {
        telemetry::init(args.globals.log_level())?;
        info!(
            "Starting {} {} (PID {})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            std::process::id()
        );
        let state = app_state(args, base)?;
        api::new(args.bind_addr(), state).await
    });

    if let Err(err) = &result {
        error!("Server error: {err:#}");
    }
    telemetry::shutdown_tracer();

    if let Err(err) = manager.release_pid_file(std::process::id()) {
        error!("Failed to remove PID file: {err}");
    }

    result
}
