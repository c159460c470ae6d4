//! CSRF token verification and emission.
//!
//! The token travels in the `token` request parameter (query first,
//! then body) and must match the session's stored token byte-for-byte.
//! Comparison is constant-time; naive equality is a timing side
//! channel.

use crate::config::CsrfLevel;
use crate::dispatch::DispatchRequest;
use crate::helpers::html_escape;
use crate::session::Session;
use subtle::ConstantTimeEq;

/// Request parameter carrying the CSRF token.
pub const TOKEN_PARAM: &str = "token";

/// Verifies and emits session-bound CSRF tokens.
#[derive(Debug, Clone, Copy)]
pub struct CsrfGuard {
    level: CsrfLevel,
}

impl CsrfGuard {
    /// Build a guard at the configured level.
    #[must_use]
    pub const fn new(level: CsrfLevel) -> Self {
        Self { level }
    }

    /// The configured protection level.
    #[must_use]
    pub const fn level(&self) -> CsrfLevel {
        self.level
    }

    /// Verify the request token against the session token.
    ///
    /// With [`CsrfLevel::None`] this always succeeds. Otherwise the
    /// token is read from query parameters first, then body parameters,
    /// and must equal the session token exactly. A missing session,
    /// missing token or empty token fails.
    #[must_use]
    pub fn verify(&self, request: &DispatchRequest, session: Option<&Session>) -> bool {
        if !self.level.is_enabled() {
            return true;
        }

        let supplied = request
            .query
            .get(TOKEN_PARAM)
            .or_else(|| request.form.get(TOKEN_PARAM))
            .filter(|token| !token.is_empty());

        let Some(supplied) = supplied else {
            return false;
        };
        let Some(stored) = session.and_then(Session::csrf_token) else {
            return false;
        };

        constant_time_eq(supplied.as_bytes(), stored.as_bytes())
    }

    /// Token formatted for an outgoing link (`&token=...`).
    ///
    /// Empty when verification is disabled, and under
    /// [`CsrfLevel::Paranoid`], where tokens are never emitted into
    /// URLs (they would leak via referrers and logs).
    #[must_use]
    pub fn query_fragment(&self, session: Option<&Session>) -> String {
        if !self.level.is_enabled() || self.level == CsrfLevel::Paranoid {
            return String::new();
        }
        session
            .and_then(Session::csrf_token)
            .map_or_else(String::new, |token| {
                format!("&{TOKEN_PARAM}={}", html_escape(token))
            })
    }

    /// Token formatted as a hidden form input.
    ///
    /// Empty when verification is disabled.
    #[must_use]
    pub fn form_field(&self, session: Option<&Session>) -> String {
        if !self.level.is_enabled() {
            return String::new();
        }
        session
            .and_then(Session::csrf_token)
            .map_or_else(String::new, |token| {
                format!(
                    "<input type=\"hidden\" name=\"{TOKEN_PARAM}\" value=\"{}\" />",
                    html_escape(token)
                )
            })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    // Both must be the same length for a constant-time comparison.
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
