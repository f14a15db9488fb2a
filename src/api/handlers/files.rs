use crate::api::{AppState, pages};
use axum::{
    extract::{ConnectInfo, Extension, Path, Request},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

/// `GET /{module}`: the module root always ends with a slash so relative
/// links inside it resolve.
pub async fn redirect(uri: Uri) -> Redirect {
    Redirect::permanent(&format!("{}/", uri.path()))
}

/// `GET /{module}/`
pub async fn index(
    state: Extension<Arc<AppState>>,
    Path(module): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    serve(state, module, String::new(), peer, request).await
}

/// `GET /{module}/__auth__` shares its route with the passcode form; reading
/// it is a plain file lookup.
pub async fn auth_file(
    state: Extension<Arc<AppState>>,
    Path(module): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    serve(state, module, "__auth__".to_string(), peer, request).await
}

/// `GET /{module}/{*path}`
pub async fn file(
    state: Extension<Arc<AppState>>,
    Path((module, path)): Path<(String, String)>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    serve(state, module, path, peer, request).await
}

async fn serve(
    Extension(state): Extension<Arc<AppState>>,
    module: String,
    path: String,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    let ctx = super::request_context(request.headers().clone(), peer, state.trust_proxy_headers);
    let gate = Arc::clone(&state.gate);
    let name = module.clone();

    let decision =
        tokio::task::spawn_blocking(move || gate.authorize(&name, &path, &ctx)).await;

    match decision {
        Ok(Ok(file)) => {
            debug!("Serving {}", file.display());
            match ServeFile::new(file).oneshot(request).await {
                Ok(response) => response.into_response(),
                Err(never) => match never {},
            }
        }
        Ok(Err(denial)) => {
            debug!("Request for {module} denied: {denial}");
            pages::denial(&module, denial)
        }
        Err(err) => super::internal_error(&err),
    }
}
