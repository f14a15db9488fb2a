//! Signed, timestamped session tokens.
//!
//! Wire format: `<b64url(module)>.<issued_at>.<b64url(mac)>`, where `mac` is
//! HMAC-SHA256 over `<b64url(module)>.<issued_at>` keyed by the process secret.
//! Every failure (bad shape, bad MAC, expired) collapses into `None`.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use super::secret::ProcessSecret;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_MAX_AGE_SECONDS: u64 = 24 * 60 * 60;
/// Tolerated clock skew for tokens stamped slightly in the future.
const MAX_FUTURE_SKEW_SECONDS: u64 = 60;

#[derive(Clone, Debug)]
pub struct TokenService {
    secret: ProcessSecret,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: ProcessSecret) -> Self {
        Self { secret }
    }

    /// Issue a token bound to `module` at the current time.
    #[must_use]
    pub fn issue(&self, module: &str) -> String {
        self.issue_at(module, unix_now())
    }

    #[must_use]
    pub fn issue_at(&self, module: &str, issued_at: u64) -> String {
        let payload = format!("{}.{issued_at}", Base64UrlUnpadded::encode_string(module.as_bytes()));
        let signature = Base64UrlUnpadded::encode_string(&self.sign(payload.as_bytes()));
        format!("{payload}.{signature}")
    }

    /// Validate a token, returning the module it was issued for.
    #[must_use]
    pub fn validate(&self, token: &str, max_age_seconds: u64) -> Option<String> {
        self.validate_at(token, max_age_seconds, unix_now())
    }

    #[must_use]
    pub fn validate_at(&self, token: &str, max_age_seconds: u64, now: u64) -> Option<String> {
        let (payload, signature) = token.rsplit_once('.')?;
        let signature = Base64UrlUnpadded::decode_vec(signature).ok()?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let (module, issued_at) = payload.split_once('.')?;
        let issued_at: u64 = issued_at.parse().ok()?;
        if issued_at > now.saturating_add(MAX_FUTURE_SKEW_SECONDS) {
            return None;
        }
        if now.saturating_sub(issued_at) > max_age_seconds {
            return None;
        }

        let module = Base64UrlUnpadded::decode_vec(module).ok()?;
        String::from_utf8(module).ok()
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.key())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn service(secret: &str) -> TokenService {
        TokenService::new(ProcessSecret::from(secret))
    }

    #[test]
    fn issued_token_validates_for_module() {
        let tokens = service("s1");
        let token = tokens.issue("demo");
        assert_eq!(
            tokens.validate(&token, DEFAULT_MAX_AGE_SECONDS).as_deref(),
            Some("demo")
        );
    }

    #[test]
    fn token_expires_after_max_age() {
        let tokens = service("s1");
        let token = tokens.issue_at("demo", NOW);
        assert_eq!(
            tokens.validate_at(&token, 60, NOW + 60).as_deref(),
            Some("demo")
        );
        assert_eq!(tokens.validate_at(&token, 60, NOW + 61), None);
        assert_eq!(
            tokens.validate_at(&token, DEFAULT_MAX_AGE_SECONDS, NOW + DEFAULT_MAX_AGE_SECONDS + 1),
            None
        );
    }

    #[test]
    fn token_from_the_future_is_rejected() {
        let tokens = service("s1");
        let token = tokens.issue_at("demo", NOW + 3_600);
        assert_eq!(tokens.validate_at(&token, DEFAULT_MAX_AGE_SECONDS, NOW), None);
        let skewed = tokens.issue_at("demo", NOW + 30);
        assert!(tokens.validate_at(&skewed, DEFAULT_MAX_AGE_SECONDS, NOW).is_some());
    }

    #[test]
    fn other_secret_never_validates() {
        let token = service("s1").issue("demo");
        assert_eq!(service("s2").validate(&token, DEFAULT_MAX_AGE_SECONDS), None);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = service("s1");
        let token = tokens.issue_at("demo", NOW);
        let other = tokens.issue_at("other", NOW);

        // Swap the payload while keeping the original signature.
        let (_, signature) = token.rsplit_once('.').unwrap_or_default();
        let (payload, _) = other.rsplit_once('.').unwrap_or_default();
        let forged = format!("{payload}.{signature}");
        assert_eq!(tokens.validate_at(&forged, DEFAULT_MAX_AGE_SECONDS, NOW), None);

        // Push the timestamp forward without re-signing.
        let extended = token.replacen(&NOW.to_string(), &(NOW + 100).to_string(), 1);
        assert_eq!(
            tokens.validate_at(&extended, DEFAULT_MAX_AGE_SECONDS, NOW + 100),
            None
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let tokens = service("s1");
        for token in ["", ".", "..", "a.b.c", "demo", "ZGVtbw.notanumber.AAAA", "%%%.1.%%%"] {
            assert_eq!(
                tokens.validate_at(token, DEFAULT_MAX_AGE_SECONDS, NOW),
                None,
                "{token}"
            );
        }
    }

    #[test]
    fn module_names_with_dots_survive() {
        let tokens = service("s1");
        let token = tokens.issue_at("v1.2-docs", NOW);
        assert_eq!(
            tokens.validate_at(&token, DEFAULT_MAX_AGE_SECONDS, NOW).as_deref(),
            Some("v1.2-docs")
        );
    }
}
