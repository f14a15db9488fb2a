use crate::api::{AppState, pages};
use axum::{
    extract::Extension,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

/// `GET /all/`
pub async fn listing(Extension(state): Extension<Arc<AppState>>) -> Response {
    let gate = Arc::clone(&state.gate);
    match tokio::task::spawn_blocking(move || gate.modules()).await {
        Ok(Ok(modules)) => Html(pages::listing(&modules)).into_response(),
        Ok(Err(err)) => {
            error!("Failed to list modules: {err}");
            Html(pages::listing(&[])).into_response()
        }
        Err(err) => super::internal_error(&err),
    }
}
