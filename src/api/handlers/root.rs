use axum::response::Html;

/// `GET /`: intentionally blank so the module list is not advertised.
pub async fn root() -> Html<&'static str> {
    Html("")
}
