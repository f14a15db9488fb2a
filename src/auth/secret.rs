//! Installation-wide signing secret for session tokens.

use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};
use tracing::info;

const SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("process secret unavailable at {path}: {source}")]
    Unavailable { path: PathBuf, source: io::Error },
    #[error("process secret at {0} is empty")]
    Empty(PathBuf),
}

#[derive(Clone)]
pub struct ProcessSecret(SecretString);

impl ProcessSecret {
    /// Read the secret at `path`, generating and persisting it (mode 600) on
    /// first use.
    ///
    /// # Errors
    /// Returns `SecretError` if the file cannot be read or created, or is empty.
    pub fn load_or_create(path: &Path) -> Result<Self, SecretError> {
        let unavailable = |source| SecretError::Unavailable {
            path: path.to_path_buf(),
            source,
        };

        match fs::read_to_string(path) {
            Ok(contents) => return Self::from_contents(path, &contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(unavailable(err)),
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(unavailable)?;
        }

        let mut bytes = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        let encoded = hex::encode(bytes);

        let created = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path);
        match created {
            Ok(mut file) => {
                file.write_all(encoded.as_bytes()).map_err(unavailable)?;
                file.sync_all().map_err(unavailable)?;
                info!("Generated new process secret at {}", path.display());
                Ok(Self(SecretString::from(encoded)))
            }
            // Another process won the race; use its secret.
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let contents = fs::read_to_string(path).map_err(unavailable)?;
                Self::from_contents(path, &contents)
            }
            Err(err) => Err(unavailable(err)),
        }
    }

    fn from_contents(path: &Path, contents: &str) -> Result<Self, SecretError> {
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Err(SecretError::Empty(path.to_path_buf()));
        }
        Ok(Self(SecretString::from(trimmed.to_string())))
    }

    /// Key material used for signing.
    pub(crate) fn key(&self) -> &[u8] {
        self.0.expose_secret().as_bytes()
    }
}

impl From<&str> for ProcessSecret {
    fn from(value: &str) -> Self {
        Self(SecretString::from(value.to_string()))
    }
}

impl std::fmt::Debug for ProcessSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProcessSecret(***)")
    }
}
