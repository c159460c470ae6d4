//! Session cookie middleware.
//!
//! Extracts the session cookie into request extensions for the
//! dispatcher, and translates the dispatcher's session markers
//! ([`IssuedSession`] / [`ClearedSession`]) into `Set-Cookie` headers
//! on the way out. Session creation itself belongs to the session
//! guard, never to this layer.

use crate::session::{ClearedSession, IssuedSession, SessionId};
use axum::{
    body::Body,
    extract::Request,
    http::header::{COOKIE, SET_COOKIE},
    response::Response,
};
use std::str::FromStr;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Cookie attributes for the session cookie.
#[derive(Clone, Debug)]
pub struct CookieConfig {
    /// Cookie name; defaults to the configured session name.
    pub cookie_name: String,
    /// Cookie path.
    pub cookie_path: String,
    /// HTTP-only cookie (recommended: true).
    pub http_only: bool,
    /// Secure cookie (HTTPS only).
    pub secure: bool,
    /// SameSite policy.
    pub same_site: SameSite,
    /// Cookie lifetime in seconds.
    pub max_age_secs: u64,
}

impl CookieConfig {
    /// Default attributes for a named session cookie.
    #[must_use]
    pub fn named(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            cookie_path: "/".to_string(),
            http_only: true,
            secure: !cfg!(debug_assertions),
            same_site: SameSite::Lax,
            max_age_secs: 86400, // 24 hours
        }
    }
}

/// SameSite cookie policy.
#[derive(Clone, Copy, Debug, Default)]
pub enum SameSite {
    /// Strict same-site policy.
    Strict,
    /// Lax same-site policy (recommended).
    #[default]
    Lax,
    /// No same-site restriction (requires Secure).
    None,
}

impl SameSite {
    /// Convert to the cookie attribute string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Session identifier carried from the cookie into request extensions.
#[derive(Debug, Clone, Default)]
pub struct SessionCookie(pub Option<SessionId>);

/// Layer applying [`SessionMiddleware`].
#[derive(Clone, Debug)]
pub struct SessionLayer {
    config: CookieConfig,
}

impl SessionLayer {
    /// Create a session layer for the named cookie.
    #[must_use]
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            config: CookieConfig::named(cookie_name),
        }
    }

    /// Create a session layer with custom cookie attributes.
    #[must_use]
    pub const fn with_config(config: CookieConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Middleware translating between cookies and session extensions.
#[derive(Clone, Debug)]
pub struct SessionMiddleware<S> {
    inner: S,
    config: CookieConfig,
}

impl<S> Service<Request> for SessionMiddleware<S>
where
    S: Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let config = self.config.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let session_id = extract_session_id(&req, &config.cookie_name);
            req.extensions_mut().insert(SessionCookie(session_id));

            let mut response = inner.call(req).await?;

            if let Some(IssuedSession(id)) = response.extensions().get::<IssuedSession>().cloned()
            {
                set_session_cookie(&mut response, &id, &config);
            } else if response.extensions().get::<ClearedSession>().is_some() {
                expire_session_cookie(&mut response, &config);
            }

            Ok(response)
        })
    }
}

/// Extract and validate the session identifier from request cookies.
fn extract_session_id(req: &Request, cookie_name: &str) -> Option<SessionId> {
    let cookie_header = req.headers().get(COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=') {
            if name.trim() == cookie_name {
                return SessionId::from_str(value.trim()).ok();
            }
        }
    }

    None
}

/// Set the session cookie on the response.
fn set_session_cookie(response: &mut Response<Body>, session_id: &SessionId, config: &CookieConfig) {
    let cookie_value = format!(
        "{}={}; Path={}; Max-Age={}; SameSite={}",
        config.cookie_name,
        session_id.as_str(),
        config.cookie_path,
        config.max_age_secs,
        config.same_site.as_str()
    );
    append_cookie(response, cookie_value, config);
}

/// Expire the session cookie after an explicit destroy.
fn expire_session_cookie(response: &mut Response<Body>, config: &CookieConfig) {
    let cookie_value = format!(
        "{}=; Path={}; Max-Age=0; SameSite={}",
        config.cookie_name,
        config.cookie_path,
        config.same_site.as_str()
    );
    append_cookie(response, cookie_value, config);
}

fn append_cookie(response: &mut Response<Body>, mut cookie_value: String, config: &CookieConfig) {
    if config.http_only {
        cookie_value.push_str("; HttpOnly");
    }
    if config.secure {
        cookie_value.push_str("; Secure");
    }
    if let Ok(header_value) = cookie_value.parse() {
        response.headers_mut().append(SET_COOKIE, header_value);
    }
}
