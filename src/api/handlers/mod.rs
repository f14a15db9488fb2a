pub mod auth;
pub mod files;
pub mod listing;
pub mod root;

use crate::auth::HttpContext;
use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tokio::task::JoinError;
use tracing::error;

// common functions for the handlers

/// Gate context for a request, honoring proxy headers only when configured.
pub(crate) fn request_context(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    trust_proxy_headers: bool,
) -> HttpContext {
    HttpContext::new(headers, peer.map(|ConnectInfo(addr)| addr.ip()))
        .with_trust_proxy_headers(trust_proxy_headers)
}

pub(crate) fn internal_error(err: &JoinError) -> Response {
    error!("Blocking task failed: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}
