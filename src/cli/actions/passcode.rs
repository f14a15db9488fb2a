use crate::{
    auth::{PasscodeCodec, credential},
    cli::globals::GlobalArgs,
};
use anyhow::{Context, Result, bail};
use nix::sys::termios::{self, LocalFlags, SetArg};
use secrecy::{ExposeSecret, SecretString};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};
use tracing::info;

/// Non-interactive source for the passcode.
pub const PASSCODE_ENV: &str = "DEMO_SERVER_PASSCODE";

#[derive(Debug, Clone)]
pub struct Args {
    pub globals: GlobalArgs,
    pub path: PathBuf,
}

/// Handle `set-passcode`.
///
/// # Errors
/// Returns an error if the path is not a directory, the passcode is empty or
/// mistyped, or the credential record cannot be written.
pub fn set(args: &Args) -> Result<()> {
    if !args.path.is_dir() {
        bail!("{} is not a directory", args.path.display());
    }

    let passcode = match std::env::var(PASSCODE_ENV) {
        Ok(value) => SecretString::from(value),
        Err(_) => {
            let first = prompt_hidden("Passcode: ")?;
            let second = prompt_hidden("Confirm passcode: ")?;
            if first.expose_secret() != second.expose_secret() {
                bail!("Passcodes do not match");
            }
            first
        }
    };

    let path = store(args, &passcode)?;
    info!("Credential record written to {}", path.display());
    println!("Passcode set for {}", args.path.display());
    Ok(())
}

fn store(args: &Args, passcode: &SecretString) -> Result<PathBuf> {
    if passcode.expose_secret().is_empty() {
        bail!("Passcode cannot be empty");
    }
    credential::store(&args.path, passcode.expose_secret(), &PasscodeCodec::default())
        .with_context(|| format!("Failed to write passcode for {}", args.path.display()))
}

/// Read one line from stdin with terminal echo disabled. Falls back to a
/// plain read when stdin is not a terminal.
fn prompt_hidden(prompt: &str) -> Result<SecretString> {
    let stdin = io::stdin();
    eprint!("{prompt}");
    io::stderr().flush()?;

    let original = termios::tcgetattr(&stdin).ok();
    if let Some(original) = &original {
        let mut silent = original.clone();
        silent.local_flags.remove(LocalFlags::ECHO);
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &silent)
            .context("Failed to disable terminal echo")?;
    }

    let mut line = String::new();
    let read = stdin.lock().read_line(&mut line);

    if let Some(original) = &original {
        let _ = termios::tcsetattr(&stdin, SetArg::TCSANOW, original);
        eprintln!();
    }

    if read.context("Failed to read passcode")? == 0 {
        bail!("No passcode entered");
    }
    Ok(SecretString::from(
        line.trim_end_matches(['\r', '\n']).to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credential::CREDENTIAL_FILE;

    fn args(path: PathBuf) -> Args {
        Args {
            globals: GlobalArgs::new(PathBuf::from("/tmp/state")),
            path,
        }
    }

    #[test]
    fn rejects_non_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x")?;
        let err = set(&args(file)).err().map(|e| e.to_string());
        assert!(err.is_some_and(|e| e.contains("is not a directory")));
        Ok(())
    }

    #[test]
    fn rejects_empty_passcode() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let result = store(&args(dir.path().to_path_buf()), &SecretString::from(""));
        assert!(result.is_err());
        assert!(!dir.path().join(CREDENTIAL_FILE).exists());
        Ok(())
    }

    #[test]
    fn reads_passcode_from_env() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let module = dir.path().to_path_buf();
        temp_env::with_var(PASSCODE_ENV, Some("s3cret"), || set(&args(module.clone())))?;

        let record = credential::load(dir.path())?.context("record")?;
        assert!(!record.is_legacy());
        assert!(record.verify(&PasscodeCodec::default(), "s3cret"));
        Ok(())
    }
}
