//! Minimal security-first MVC web framework.
//!
//! Requests are dispatched to registered controllers selected by URL
//! parameters; dynamic file loading is gated by a configured allow-list
//! (the defense against local file inclusion); state-changing actions
//! are protected by session-bound CSRF tokens; and authenticated
//! controllers are gated by an explicit, deny-by-default session check.
//!
//! # Example
//!
//! ```rust,no_run
//! use palisade::{
//!     Controller, ControllerRegistry, Dispatcher, FrameworkConfig, FrameworkError,
//!     RequestContext, TemplateScope,
//! };
//! use async_trait::async_trait;
//! use axum::response::Response;
//! use std::sync::Arc;
//!
//! struct HomeController;
//!
//! #[async_trait]
//! impl Controller for HomeController {
//!     fn safe_actions(&self) -> &[&str] {
//!         &["view"]
//!     }
//!
//!     async fn invoke(
//!         &self,
//!         action: &str,
//!         ctx: &mut RequestContext,
//!     ) -> Result<Response, FrameworkError> {
//!         match action {
//!             "view" => ctx.render("home", TemplateScope::new()),
//!             other => Err(FrameworkError::NotFound(other.to_string())),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     palisade::init_tracing();
//!     let config = Arc::new(FrameworkConfig::load()?);
//!
//!     let mut registry = ControllerRegistry::new();
//!     registry.register("home", || Box::new(HomeController));
//!
//!     let dispatcher = Arc::new(Dispatcher::new(config, registry));
//!     palisade::serve(dispatcher).await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod csrf;
pub mod dispatch;
pub mod error;
pub mod helpers;
pub mod loader;
pub mod middleware;
pub mod model;
pub mod router;
pub mod session;
pub mod upload;
pub mod view;

// Re-export key types for convenience
pub use config::{ConfigError, ConfigKey, CsrfLevel, Environment, FrameworkConfig};
pub use csrf::CsrfGuard;
pub use dispatch::{Controller, ControllerRegistry, DispatchRequest, Dispatcher, RequestContext, SessionPolicy};
pub use error::FrameworkError;
pub use loader::{LoadError, Loaded, SafeFileSet, SafeLoader};
pub use model::{Dao, SqlBuilder, SqlValue, ValueObject};
pub use router::{init_tracing, router, serve};
pub use session::{Session, SessionGuard, SessionId, SessionStore};
pub use upload::ImageStore;
pub use view::{TemplateScope, ViewRenderer};
