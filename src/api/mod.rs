use crate::auth::AccessGate;
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, debug_span, info};
use ulid::Ulid;

mod handlers;
pub mod pages;

use self::handlers::{auth, files, listing, root};

const REQUEST_ID: &str = "x-request-id";

/// Services shared by every handler.
#[derive(Debug)]
pub struct AppState {
    pub gate: Arc<AccessGate>,
    pub trust_proxy_headers: bool,
}

impl AppState {
    #[must_use]
    pub fn new(gate: AccessGate) -> Self {
        Self {
            gate: Arc::new(gate),
            trust_proxy_headers: false,
        }
    }

    #[must_use]
    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }
}

/// Build the application router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root::root))
        .route("/all/", get(listing::listing))
        .route("/:module", get(files::redirect))
        .route(
            "/:module/__auth__",
            post(auth::submit).get(files::auth_file),
        )
        .route("/:module/", get(files::index))
        .route("/:module/*path", get(files::file))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Serve until SIGTERM or Ctrl-C.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn new(addr: SocketAddr, state: AppState) -> Result<()> {
    let base = state.gate.base().display().to_string();
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Serving {base} on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gracefully shutdown");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let method = request.method();
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", %method, path, request_id)
}
