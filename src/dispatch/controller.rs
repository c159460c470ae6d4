//! Controller trait, registry and per-request context.

use super::DispatchRequest;
use crate::config::FrameworkConfig;
use crate::csrf::CsrfGuard;
use crate::error::FrameworkError;
use crate::session::{Session, SessionGuard};
use crate::view::{TemplateScope, ViewRenderer};
use async_trait::async_trait;
use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// How a controller relates to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPolicy {
    /// No session is touched.
    #[default]
    Stateless,
    /// A session is initialized before any action executes (arming the
    /// CSRF token), without gating on authentication.
    Required,
    /// Like `Required`, and the action is denied unless the
    /// controller's session check passes against the live session.
    Authenticated,
}

/// A controller: a named set of actions invocable from untrusted input.
///
/// Only actions listed by [`Controller::safe_actions`] may be invoked —
/// a deliberate capability allow-list, distinct from an action method
/// merely existing.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Actions this controller declares invocable from untrusted input.
    /// The default action is always auto-registered in addition.
    fn safe_actions(&self) -> &[&str];

    /// Actions requiring CSRF verification before invocation.
    fn csrf_protected_actions(&self) -> &[&str] {
        &[]
    }

    /// Session requirement for this controller.
    fn session_policy(&self) -> SessionPolicy {
        SessionPolicy::Stateless
    }

    /// Session check applied under [`SessionPolicy::Authenticated`].
    ///
    /// Deny-by-default: the stock check requires the live session's
    /// authenticated flag.
    fn check_session(&self, session: &Session) -> bool {
        session.is_authenticated()
    }

    /// Controller-specific default action, overriding the configured
    /// one.
    fn default_action(&self) -> Option<&str> {
        None
    }

    /// Execute the resolved action.
    ///
    /// # Errors
    ///
    /// Any [`FrameworkError`] aborts the request with the uniform
    /// security response.
    async fn invoke(
        &self,
        action: &str,
        ctx: &mut RequestContext,
    ) -> Result<Response, FrameworkError>;
}

type ControllerFactory = Box<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

/// Registry mapping controller identifiers to factories.
///
/// Populated at startup and looked up by name with explicit not-found
/// handling — there is no string-driven instantiation or autoloading
/// side effect.
#[derive(Default)]
pub struct ControllerRegistry {
    factories: HashMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller under its URL identifier (e.g. `home`).
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Controller> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Construct the controller registered under `name`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Box<dyn Controller>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Whether a controller is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Number of registered controllers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("controllers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Per-request state handed to an executing action.
#[derive(Debug)]
pub struct RequestContext {
    config: Arc<FrameworkConfig>,
    views: Arc<ViewRenderer>,
    guard: Arc<SessionGuard>,
    csrf: CsrfGuard,
    /// The request being dispatched.
    pub request: DispatchRequest,
    controller: String,
    action: String,
    exports: TemplateScope,
    session: Option<Session>,
    session_destroyed: bool,
}

impl RequestContext {
    pub(crate) fn new(
        config: Arc<FrameworkConfig>,
        views: Arc<ViewRenderer>,
        guard: Arc<SessionGuard>,
        csrf: CsrfGuard,
        request: DispatchRequest,
        controller: String,
        action: String,
        session: Option<Session>,
    ) -> Self {
        let mut exports = TemplateScope::new();
        exports.insert("controller", &controller);
        exports.insert("action", &action);
        exports.insert("url", &config.base_url);
        exports.insert("web_path", config.dirs.static_assets.display().to_string());
        exports.insert("title", &config.default_title);
        exports.insert_safe("csrf_field", csrf.form_field(session.as_ref()));
        exports.insert_safe("csrf_query", csrf.query_fragment(session.as_ref()));

        Self {
            config,
            views,
            guard,
            csrf,
            request,
            controller,
            action,
            exports,
            session,
            session_destroyed: false,
        }
    }

    /// Resolved controller name.
    #[must_use]
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Resolved action name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The process configuration.
    #[must_use]
    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    /// The current session, when the controller's policy armed one.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Mutable access to the current session; changes are written back
    /// after the action completes.
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Destroy the current session (logout). Idempotent.
    pub fn destroy_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.guard.destroy_session(session.id());
            self.session_destroyed = true;
        }
    }

    /// Token formatted for an outgoing link.
    #[must_use]
    pub fn csrf_query_fragment(&self) -> String {
        self.csrf.query_fragment(self.session.as_ref())
    }

    /// Token formatted as a hidden form input.
    #[must_use]
    pub fn csrf_form_field(&self) -> String {
        self.csrf.form_field(self.session.as_ref())
    }

    /// Export an additional value to every view rendered by this
    /// request.
    pub fn export(&mut self, key: impl Into<String>, value: impl Serialize) {
        self.exports.insert(key, value);
    }

    /// Render a view with the controller context plus `vars`;
    /// action-supplied values override exported ones.
    ///
    /// # Errors
    ///
    /// Propagates loader denials and template failures.
    pub fn render(&self, view: &str, vars: TemplateScope) -> Result<Response, FrameworkError> {
        let mut scope = self.exports.clone();
        scope.merge(vars);
        let html = self.views.render(view, &scope)?;
        Ok(Html(html).into_response())
    }

    pub(crate) const fn session_destroyed(&self) -> bool {
        self.session_destroyed
    }

    pub(crate) fn take_session(&mut self) -> Option<Session> {
        self.session.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullController;

    #[async_trait]
    impl Controller for NullController {
        fn safe_actions(&self) -> &[&str] {
            &["view"]
        }

        async fn invoke(
            &self,
            _action: &str,
            _ctx: &mut RequestContext,
        ) -> Result<Response, FrameworkError> {
            Ok(Html("ok").into_response())
        }
    }

    #[test]
    fn test_registry_resolves_registered_names_only() {
        let mut registry = ControllerRegistry::new();
        registry.register("home", || Box::new(NullController));

        assert!(registry.contains("home"));
        assert!(registry.resolve("home").is_some());
        assert!(registry.resolve("Home").is_none());
        assert!(registry.resolve("admin").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_default_policy_is_stateless_and_deny_by_default() {
        let controller = NullController;
        assert_eq!(controller.session_policy(), SessionPolicy::Stateless);
        assert!(controller.csrf_protected_actions().is_empty());

        let mut config = FrameworkConfig::default();
        config.csrf_level = crate::config::CsrfLevel::Basic;
        let guard = SessionGuard::new(
            &config,
            Arc::new(crate::session::SessionStore::new()),
        );
        let (session, _) = guard.init_session(None);
        assert!(!controller.check_session(&session));
    }
}
