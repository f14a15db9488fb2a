//! HTML bodies returned by the server.

use crate::auth::{Denial, module_location};
use axum::response::{Html, IntoResponse, Response};
use std::fmt::Write;

const STYLE: &str = "body { font-family: sans-serif; display: flex; justify-content: center; \
align-items: center; height: 100vh; margin: 0; background: #f5f5f5; }
.box { background: white; padding: 2rem; border-radius: 8px; \
box-shadow: 0 2px 8px rgba(0,0,0,.1); text-align: center; }
input[type=password] { padding: .5rem; font-size: 1rem; margin: .5rem 0; }
button { padding: .5rem 1.5rem; font-size: 1rem; cursor: pointer; }
ul { text-align: left; }
.error { color: red; }";

/// Escape text for use in HTML element content and quoted attributes.
#[must_use]
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title>\n<style>\n{STYLE}\n</style></head>\n<body><div class=\"box\">\n{body}\n</div></body></html>\n",
        html_escape(title)
    )
}

/// Passcode prompt for `module`, optionally with an error line.
#[must_use]
pub fn passcode_form(module: &str, error: Option<&str>) -> String {
    let action = format!("{}__auth__", module_location(module));
    let error = error
        .map(|message| format!("<p class=\"error\">{}</p>", html_escape(message)))
        .unwrap_or_default();
    document(
        "Passcode Required",
        &format!(
            "  <h2>&#x1F512; {}</h2>\n  <form method=\"post\" action=\"{}\">\n    <div><input type=\"password\" name=\"passcode\" placeholder=\"Enter passcode\" autofocus /></div>\n    {error}\n    <div><button type=\"submit\">Submit</button></div>\n  </form>",
            html_escape(module),
            html_escape(&action),
        ),
    )
}

/// Index of the available modules.
#[must_use]
pub fn listing(modules: &[String]) -> String {
    let mut items = String::new();
    for module in modules {
        let _ = write!(
            items,
            "<li><a href=\"{}\">{}</a></li>",
            html_escape(&module_location(module)),
            html_escape(module)
        );
    }
    document(
        env!("CARGO_PKG_NAME"),
        &format!(
            "  <h1>{}</h1>\n  <p>Available modules:</p>\n  <ul>{items}</ul>",
            env!("CARGO_PKG_NAME")
        ),
    )
}

/// Response for a request the gate refused.
#[must_use]
pub fn denial(module: &str, denial: Denial) -> Response {
    let body = match denial {
        Denial::Challenge => passcode_form(module, None),
        Denial::WrongPasscode => passcode_form(module, Some("Wrong passcode.")),
        Denial::RateLimited => "Too many attempts. Try again later.".to_string(),
        Denial::NotFound => "Not found".to_string(),
        Denial::Forbidden => "Forbidden".to_string(),
    };
    (denial.status(), Html(body)).into_response()
}
