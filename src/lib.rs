//! # demo-server (static modules behind a passcode)
//!
//! `demo-server` serves the top-level directories ("modules") of a base path.
//! Any module may be protected by a shared passcode stored in its `.encrypt`
//! file; visitors prove knowledge of the passcode once and receive a signed,
//! time-limited session cookie scoped to that module.
//!
//! ## Access control
//!
//! - **Passcodes** are stored as `salt_hex:hash_hex` (PBKDF2-HMAC-SHA256,
//!   100 000 iterations). A bare value without `:` is accepted as a legacy
//!   plaintext record.
//! - **Sessions** are HMAC-SHA256 tokens carrying the module name and issue
//!   time, keyed by a per-installation secret. They expire after 24 hours;
//!   deleting the secret invalidates every outstanding session.
//! - **Rate limiting** caps passcode attempts per client and module inside a
//!   sliding window (5 attempts per 60 seconds by default).
//! - **Path safety**: dot-prefixed segments are never served, and every
//!   resolved file must live inside the canonical module root.
//!
//! ## Daemon
//!
//! The `start` command double-forks into the background before the async
//! runtime exists, tracks itself in `~/.demo-server/daemon.pid` and appends its
//! output to `~/.demo-server/logs/server.log`.

pub mod api;
pub mod auth;
pub mod cli;
pub mod daemon;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
