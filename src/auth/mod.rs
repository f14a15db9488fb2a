//! Access control for modules: passcodes, session tokens, rate limiting and
//! the per-request decision.

pub mod context;
pub mod credential;
pub mod gate;
pub mod passcode;
pub mod rate_limit;
pub mod secret;
pub mod token;

pub use self::context::{HttpContext, RequestContext};
pub use self::gate::{AccessGate, Session, cookie_name, module_location};
pub use self::passcode::PasscodeCodec;
pub use self::rate_limit::{NoopRateLimiter, RateLimitDecision, RateLimiter, SlidingWindowLimiter};
pub use self::secret::{ProcessSecret, SecretError};
pub use self::token::TokenService;

use axum::http::StatusCode;

/// Why a request was not served. Every variant is answered with a status code
/// and a page; none of them is a server fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("passcode required")]
    Challenge,
    #[error("wrong passcode")]
    WrongPasscode,
    #[error("too many attempts")]
    RateLimited,
}

impl Denial {
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden | Self::WrongPasscode => StatusCode::FORBIDDEN,
            Self::Challenge => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}
