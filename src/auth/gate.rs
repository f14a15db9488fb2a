//! Request-time access decisions for modules.
//!
//! `authorize` answers "may this request read this file?" and `authenticate`
//! handles passcode submissions. Both are synchronous and touch the
//! filesystem, so async callers should run them on a blocking thread.

use std::{
    fmt, fs, io,
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, error, warn};

use super::{
    Denial,
    context::{RequestContext, UNKNOWN_CLIENT},
    credential,
    passcode::PasscodeCodec,
    rate_limit::{RateLimiter, limiter_key},
    token::{DEFAULT_MAX_AGE_SECONDS, TokenService},
};

pub const DEFAULT_DOCUMENT: &str = "index.html";
pub const PASSCODE_FIELD: &str = "passcode";
const COOKIE_PREFIX: &str = "auth_";

pub struct AccessGate {
    base: PathBuf,
    tokens: TokenService,
    limiter: Arc<dyn RateLimiter>,
    codec: PasscodeCodec,
    session_max_age: u64,
}

impl fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGate")
            .field("base", &self.base)
            .field("codec", &self.codec)
            .field("session_max_age", &self.session_max_age)
            .finish_non_exhaustive()
    }
}

impl AccessGate {
    /// Gate for the modules under `base`.
    ///
    /// # Errors
    /// Returns an error if `base` cannot be canonicalized or is not a directory.
    pub fn new(
        base: &Path,
        tokens: TokenService,
        limiter: Arc<dyn RateLimiter>,
    ) -> io::Result<Self> {
        let base = base.canonicalize()?;
        if !base.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", base.display()),
            ));
        }
        Ok(Self {
            base,
            tokens,
            limiter,
            codec: PasscodeCodec::default(),
            session_max_age: DEFAULT_MAX_AGE_SECONDS,
        })
    }

    #[must_use]
    pub fn with_codec(mut self, codec: PasscodeCodec) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn with_session_max_age(mut self, seconds: u64) -> Self {
        self.session_max_age = seconds;
        self
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Sorted names of the non-hidden top-level directories.
    ///
    /// # Errors
    /// Returns an error if the base directory cannot be listed.
    pub fn modules(&self) -> io::Result<Vec<String>> {
        let mut modules: Vec<String> = fs::read_dir(&self.base)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !is_hidden(name))
            .collect();
        modules.sort();
        Ok(modules)
    }

    /// Decide whether `path` inside `module` may be served.
    ///
    /// # Errors
    /// Returns the `Denial` describing why the request cannot be served.
    pub fn authorize(
        &self,
        module: &str,
        path: &str,
        ctx: &impl RequestContext,
    ) -> Result<PathBuf, Denial> {
        let module_dir = self.module_dir(module).ok_or(Denial::NotFound)?;

        let path = if path.is_empty() || path.ends_with('/') {
            format!("{path}{DEFAULT_DOCUMENT}")
        } else {
            path.to_string()
        };

        if is_hidden(module) || path.split('/').any(is_hidden) {
            debug!("Hidden path rejected: {module}/{path}");
            return Err(Denial::Forbidden);
        }

        let root = module_dir.canonicalize().map_err(|_| Denial::NotFound)?;
        let candidate = normalize_within(&root, path.trim_start_matches('/')).ok_or_else(|| {
            warn!("Path escapes module root: {module}/{path}");
            Denial::Forbidden
        })?;

        // Symlinks are resolved only for files that exist; the result must
        // still live under the module root.
        let resolved = match candidate.canonicalize() {
            Ok(real) if is_contained(&root, &real) => Some(real),
            Ok(real) => {
                warn!(
                    "Resolved path {} escapes module root {}",
                    real.display(),
                    root.display()
                );
                return Err(Denial::Forbidden);
            }
            Err(_) => None,
        };

        self.check_session(module, &module_dir, ctx)?;

        match resolved {
            Some(file) if file.is_file() => Ok(file),
            _ => Err(Denial::NotFound),
        }
    }

    /// Verify a submitted passcode and open a session for `module`.
    ///
    /// # Errors
    /// Returns `NotFound`, `RateLimited` or `WrongPasscode`.
    pub fn authenticate(&self, module: &str, ctx: &impl RequestContext) -> Result<Session, Denial> {
        let module_dir = self.module_dir(module).ok_or(Denial::NotFound)?;
        if is_hidden(module) {
            return Err(Denial::Forbidden);
        }

        let record = match credential::load(&module_dir) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(Denial::NotFound),
            Err(err) => {
                error!("Failed to read credential record for {module}: {err}");
                return Err(Denial::NotFound);
            }
        };

        let client = ctx
            .client_addr()
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
        if self.limiter.is_limited(&limiter_key(&client, module)) {
            warn!("Passcode attempts rate limited for {client} on {module}");
            return Err(Denial::RateLimited);
        }

        let passcode = ctx.form_field(PASSCODE_FIELD).unwrap_or_default();
        if !record.verify(&self.codec, &passcode) {
            warn!("Wrong passcode from {client} for {module}");
            return Err(Denial::WrongPasscode);
        }

        debug!("Session opened for {client} on {module}");

        Ok(Session {
            module: module.to_string(),
            token: self.tokens.issue(module),
            max_age: self.session_max_age,
        })
    }

    fn check_session(
        &self,
        module: &str,
        module_dir: &Path,
        ctx: &impl RequestContext,
    ) -> Result<(), Denial> {
        match credential::is_protected(module_dir) {
            Ok(false) => Ok(()),
            Ok(true) => {
                let authenticated = ctx
                    .cookie(&cookie_name(module))
                    .and_then(|token| self.tokens.validate(&token, self.session_max_age))
                    .is_some_and(|bound| bound == module);
                if authenticated {
                    Ok(())
                } else {
                    Err(Denial::Challenge)
                }
            }
            Err(err) => {
                error!("Failed to check credential record for {module}: {err}");
                Err(Denial::Challenge)
            }
        }
    }

    fn module_dir(&self, module: &str) -> Option<PathBuf> {
        if module.is_empty() || module.contains(['/', '\\', '\0']) {
            return None;
        }
        let dir = self.base.join(module);
        dir.is_dir().then_some(dir)
    }
}

/// Proof of a successful passcode submission.
pub struct Session {
    module: String,
    token: String,
    max_age: u64,
}

impl Session {
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn cookie_name(&self) -> String {
        cookie_name(&self.module)
    }

    /// `Set-Cookie` header value carrying the session token.
    #[must_use]
    pub fn set_cookie(&self) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name(),
            self.token,
            self.max_age
        )
    }

    /// Where to send the browser after authenticating.
    #[must_use]
    pub fn redirect_to(&self) -> String {
        module_location(&self.module)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("module", &self.module)
            .field("token", &"***")
            .field("max_age", &self.max_age)
            .finish()
    }
}

/// Cookie carrying the session for `module`. Bytes outside the cookie-name
/// token alphabet are percent-encoded.
#[must_use]
pub fn cookie_name(module: &str) -> String {
    let mut name = String::with_capacity(COOKIE_PREFIX.len() + module.len());
    name.push_str(COOKIE_PREFIX);
    for byte in module.bytes() {
        if is_cookie_token_byte(byte) && byte != b'%' {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name
}

/// Absolute URL path of `module`'s root (`/{module}/`), percent-encoding any
/// byte that is not allowed in a path segment.
#[must_use]
pub fn module_location(module: &str) -> String {
    let mut location = String::with_capacity(module.len() + 2);
    location.push('/');
    for byte in module.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@".contains(&byte) {
            location.push(char::from(byte));
        } else {
            location.push_str(&format!("%{byte:02X}"));
        }
    }
    location.push('/');
    location
}

fn is_cookie_token_byte(byte: u8) -> bool {
    byte.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&byte)
}

fn is_hidden(segment: &str) -> bool {
    segment.starts_with('.')
}

fn is_contained(root: &Path, path: &Path) -> bool {
    // Compare with a trailing separator so `/srv/demo-evil` is not "inside"
    // `/srv/demo`.
    let mut prefix = root.as_os_str().to_os_string();
    prefix.push(std::path::MAIN_SEPARATOR_STR);
    path.as_os_str()
        .as_encoded_bytes()
        .starts_with(prefix.as_encoded_bytes())
}

/// Lexically join `relative` onto `root`, refusing to climb above it.
fn normalize_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1)?;
                joined.pop();
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (depth > 0 && is_contained(root, &joined)).then_some(joined)
}
