//! HTTP surface: axum wiring around the dispatcher.
//!
//! The whole URL space funnels through one fallback handler that adapts
//! the HTTP request into a [`DispatchRequest`] — controller and action
//! selection happens by query parameter, not by route.

use crate::dispatch::{DispatchRequest, Dispatcher};
use crate::middleware::{SessionCookie, SessionLayer};
use anyhow::Context as _;
use axum::{
    extract::{FromRequestParts, Query, RawForm, State},
    http::{request::Parts, Method},
    response::Response,
    Router,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

impl<S> FromRequestParts<S> for SessionCookie
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or_default())
    }
}

async fn dispatch_entry(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    SessionCookie(session_id): SessionCookie,
    RawForm(body): RawForm,
) -> Response {
    let form: HashMap<String, String> = serde_urlencoded::from_bytes(&body).unwrap_or_default();

    let request = DispatchRequest {
        method,
        query,
        form,
        session_id,
    };
    dispatcher.dispatch(request).await
}

/// Build the application router around a dispatcher.
///
/// Applies the session cookie layer (named after the configured
/// session) and request tracing.
#[must_use]
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    let session_layer = SessionLayer::new(dispatcher.config().session_name.clone());
    Router::new()
        .fallback(dispatch_entry)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

/// Initialize tracing with an env-filter, defaulting to framework info
/// logs.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "palisade=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Bind the configured address and serve the dispatcher.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let config = Arc::clone(dispatcher.config());
    let app = router(dispatcher);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(project = %config.project_name, "listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
