//! Error taxonomy and blind-error responses.
//!
//! All framework errors are terminal for the current request: no
//! retries, no partial rendering. In development mode the response
//! carries the denied operation's identifying detail; in production a
//! deliberately generic message is returned instead so responses never
//! leak internal structure.

use crate::config::{ConfigError, Environment};
use crate::helpers::html_escape;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Framework error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    /// Allow-list miss: the operation or file is not authorized.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The resolved controller, view or record is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// Request token verification failed.
    #[error("not a valid request")]
    CsrfInvalid,
    /// The resolved action is not in the controller's safe-action list.
    #[error("unknown action or permission denied to execute: {0}")]
    UnknownAction(String),
    /// Bad or missing configuration property access.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// Persistence failure, non-retryable for this call.
    #[error("database error: {0}")]
    Database(String),
    /// Upload or file storage failure.
    #[error("storage error: {0}")]
    Storage(String),
    /// Template resolution or rendering failure.
    #[error("template error: {0}")]
    Template(String),
}

impl FrameworkError {
    /// HTTP status for this error.
    ///
    /// Denied loads and missing resources share a status so responses
    /// do not reveal which condition failed.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::PermissionDenied(_)
            | Self::NotFound(_)
            | Self::CsrfInvalid
            | Self::UnknownAction(_) => StatusCode::FORBIDDEN,
            Self::Configuration(_) | Self::Database(_) | Self::Storage(_) | Self::Template(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message exposed in the response body.
    #[must_use]
    pub fn public_message(&self, environment: Environment) -> String {
        if environment.is_debug() {
            return self.to_string();
        }
        match self {
            Self::PermissionDenied(_) | Self::NotFound(_) => {
                "not found or permission denied.".to_string()
            }
            Self::CsrfInvalid => "Not a valid request.".to_string(),
            Self::UnknownAction(_) => "Unknown action or permission denied to execute.".to_string(),
            Self::Database(_) => "database error.".to_string(),
            Self::Configuration(_) | Self::Storage(_) | Self::Template(_) => {
                "Fatal error!".to_string()
            }
        }
    }
}

impl From<sqlx::Error> for FrameworkError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<minijinja::Error> for FrameworkError {
    fn from(err: minijinja::Error) -> Self {
        Self::Template(err.to_string())
    }
}

/// Render an error as the uniform security-prevention response.
///
/// Terminates request processing; there is no fallthrough to default
/// output.
#[must_use]
pub fn security_response(environment: Environment, error: &FrameworkError) -> Response {
    tracing::warn!(status = %error.status(), "request denied: {error}");
    let body = format!(
        "<div class=\"security-prevention\">Security prevention: {}</div>",
        html_escape(&error.public_message(environment))
    );
    (error.status(), Html(body)).into_response()
}
