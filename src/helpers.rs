//! Helpers to aid application code: redirects, URL building, escaping.

use crate::config::FrameworkConfig;
use axum::response::{Html, IntoResponse, Redirect, Response};
use std::fmt::Write;

/// Uppercase the first character of a name, as controller and view
/// symbols are derived (`home` → `Home`).
#[must_use]
pub fn ucfirst(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

/// Minimal HTML entity escaping for user-influenced output.
#[must_use]
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTTP redirect response (`303 See Other`).
#[must_use]
pub fn http_redirect(url: &str) -> Response {
    Redirect::to(url).into_response()
}

/// Meta-refresh HTML redirect, for flows that render a page first.
#[must_use]
pub fn html_redirect(url: &str, seconds: u32) -> Response {
    let body = format!(
        "<meta http-equiv=\"refresh\" content=\"{seconds}; url={}\">",
        html_escape(url)
    );
    Html(body).into_response()
}

/// Build a dispatch URL for a controller and optional action, using the
/// configured parameter names.
#[must_use]
pub fn controller_url(config: &FrameworkConfig, controller: &str, action: Option<&str>) -> String {
    let mut url = format!(
        "{}?{}={}",
        config.base_url, config.controller_param, controller
    );
    if let Some(action) = action {
        // The write only fails on allocation failure.
        let _ = write!(url, "&{}={}", config.action_param, action);
    }
    url
}

/// Redirect to another controller/action pair.
#[must_use]
pub fn redirect_to_controller(
    config: &FrameworkConfig,
    controller: &str,
    action: Option<&str>,
) -> Response {
    http_redirect(&controller_url(config, controller, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ucfirst() {
        assert_eq!(ucfirst("home"), "Home");
        assert_eq!(ucfirst("Home"), "Home");
        assert_eq!(ucfirst(""), "");
        assert_eq!(ucfirst("a"), "A");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<b>\"x\" & 'y'</b>"),
            "&lt;b&gt;&quot;x&quot; &amp; &#x27;y&#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_controller_url() {
        let config = FrameworkConfig::default();
        assert_eq!(
            controller_url(&config, "home", None),
            "/?controller=home"
        );
        assert_eq!(
            controller_url(&config, "user", Some("list")),
            "/?controller=user&action=list"
        );
    }
}
