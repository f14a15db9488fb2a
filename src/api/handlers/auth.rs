use crate::api::{AppState, pages};
use axum::{
    extract::{ConnectInfo, Extension, Form, Path},
    http::{
        HeaderMap, StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tracing::info;

/// `POST /{module}/__auth__` with the url-encoded field `passcode`.
///
/// Success sets the session cookie and redirects to the module root with 303.
pub async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    Path(module): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let ctx = super::request_context(headers, peer, state.trust_proxy_headers).with_form(form);
    let gate = Arc::clone(&state.gate);
    let name = module.clone();

    // PBKDF2 runs here.
    let outcome = tokio::task::spawn_blocking(move || gate.authenticate(&name, &ctx)).await;

    match outcome {
        Ok(Ok(session)) => {
            info!("Passcode accepted for {module}");
            (
                StatusCode::SEE_OTHER,
                [
                    (LOCATION, session.redirect_to()),
                    (SET_COOKIE, session.set_cookie()),
                ],
            )
                .into_response()
        }
        Ok(Err(denial)) => pages::denial(&module, denial),
        Err(err) => super::internal_error(&err),
    }
}
