//! The slice of a request the access gate needs.

use axum::http::{HeaderMap, header::COOKIE};
use std::{collections::HashMap, net::IpAddr};

pub const UNKNOWN_CLIENT: &str = "unknown";

pub trait RequestContext {
    /// Identifier used for rate limiting, usually an IP address.
    fn client_addr(&self) -> Option<String>;
    fn cookie(&self, name: &str) -> Option<String>;
    fn form_field(&self, name: &str) -> Option<String>;
}

/// Request context built from HTTP headers, the peer address and an optional
/// url-encoded form body.
#[derive(Clone, Debug, Default)]
pub struct HttpContext {
    headers: HeaderMap,
    peer: Option<IpAddr>,
    trust_proxy_headers: bool,
    form: HashMap<String, String>,
}

impl HttpContext {
    #[must_use]
    pub fn new(headers: HeaderMap, peer: Option<IpAddr>) -> Self {
        Self {
            headers,
            peer,
            trust_proxy_headers: false,
            form: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    #[must_use]
    pub fn with_form(mut self, form: HashMap<String, String>) -> Self {
        self.form = form;
        self
    }
}

impl RequestContext for HttpContext {
    fn client_addr(&self) -> Option<String> {
        if self.trust_proxy_headers {
            if let Some(forwarded) = extract_forwarded_ip(&self.headers) {
                return Some(forwarded);
            }
        }
        self.peer.map(|ip| ip.to_string())
    }

    fn cookie(&self, name: &str) -> Option<String> {
        // Browsers may split cookies across several headers.
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .find_map(|pair| {
                let (key, val) = pair.trim().split_once('=')?;
                (key.trim() == name).then(|| val.trim().trim_matches('"').to_string())
            })
    }

    fn form_field(&self, name: &str) -> Option<String> {
        self.form.get(name).cloned()
    }
}

/// Extract a client IP from common proxy headers.
fn extract_forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
