//! Per-module credential records (`<module>/.encrypt`).

use secrecy::{ExposeSecret, SecretString};
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    os::unix::fs::{OpenOptionsExt, PermissionsExt},
    path::{Path, PathBuf},
};
use tracing::debug;

use super::passcode::PasscodeCodec;

pub const CREDENTIAL_FILE: &str = ".encrypt";

/// Stored passcode for a module, either salted hash or legacy plaintext.
pub struct CredentialRecord(SecretString);

impl CredentialRecord {
    #[must_use]
    pub fn new(stored: &str) -> Self {
        Self(SecretString::from(stored.trim().to_string()))
    }

    #[must_use]
    pub fn is_legacy(&self) -> bool {
        !self.0.expose_secret().contains(':')
    }

    #[must_use]
    pub fn verify(&self, codec: &PasscodeCodec, passcode: &str) -> bool {
        codec.verify(passcode, self.0.expose_secret())
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("legacy", &self.is_legacy())
            .field("stored", &"***")
            .finish()
    }
}

#[must_use]
pub fn credential_path(module_dir: &Path) -> PathBuf {
    module_dir.join(CREDENTIAL_FILE)
}

/// Whether the module carries a credential record.
///
/// # Errors
/// Returns an error if the existence check itself fails (e.g. permissions).
pub fn is_protected(module_dir: &Path) -> io::Result<bool> {
    credential_path(module_dir).try_exists()
}

/// Load the credential record, `Ok(None)` when the module is unprotected.
///
/// # Errors
/// Returns an error if the record exists but cannot be read.
pub fn load(module_dir: &Path) -> io::Result<Option<CredentialRecord>> {
    match fs::read_to_string(credential_path(module_dir)) {
        Ok(stored) => Ok(Some(CredentialRecord::new(&stored))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Hash `passcode` and write it to the module's credential file with mode 600,
/// replacing any previous record.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn store(module_dir: &Path, passcode: &str, codec: &PasscodeCodec) -> io::Result<PathBuf> {
    let path = credential_path(module_dir);
    let stored = codec.hash(passcode);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&path)?;
    // mode() only applies on creation; tighten pre-existing records too.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(stored.as_bytes())?;
    file.sync_all()?;

    debug!("Credential record written to {}", path.display());

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn store_then_load_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let codec = PasscodeCodec::with_iterations(1_000);
        assert!(!is_protected(dir.path())?);
        assert!(load(dir.path())?.is_none());

        store(dir.path(), "secret", &codec)?;

        assert!(is_protected(dir.path())?);
        let record = load(dir.path())?.ok_or_else(|| anyhow::anyhow!("missing record"))?;
        assert!(!record.is_legacy());
        assert!(record.verify(&codec, "secret"));
        assert!(!record.verify(&codec, "Secret"));
        Ok(())
    }

    #[test]
    fn store_uses_owner_only_mode() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = credential_path(dir.path());
        fs::write(&path, "old")?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;

        store(dir.path(), "new", &PasscodeCodec::with_iterations(1_000))?;

        let mode = fs::metadata(&path)?.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        Ok(())
    }

    #[test]
    fn legacy_record_is_trimmed() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(credential_path(dir.path()), "plain\n")?;
        let record = load(dir.path())?.ok_or_else(|| anyhow::anyhow!("missing record"))?;
        assert!(record.is_legacy());
        assert!(record.verify(&PasscodeCodec::default(), "plain"));
        Ok(())
    }

    #[test]
    fn debug_does_not_leak() {
        let record = CredentialRecord::new("hunter2");
        assert!(!format!("{record:?}").contains("hunter2"));
    }
}
