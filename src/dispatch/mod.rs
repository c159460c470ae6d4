//! Request dispatch: controller resolution, access control and action
//! invocation.
//!
//! One dispatch cycle fully resolves, authorizes and renders before
//! returning:
//!
//! ```text
//! RESOLVE_CONTROLLER -> LOAD_CONTROLLER -> SETUP
//!     -> CSRF_CHECK (conditional) -> INVOKE_ACTION -> RENDER | ERROR
//! ```
//!
//! Every error path terminates the request with the uniform security
//! response; nothing falls through to default output.

mod controller;
mod request;

pub use controller::{Controller, ControllerRegistry, RequestContext, SessionPolicy};
pub use request::DispatchRequest;

use crate::config::FrameworkConfig;
use crate::csrf::CsrfGuard;
use crate::error::{security_response, FrameworkError};
use crate::helpers::ucfirst;
use crate::loader::SafeLoader;
use crate::session::{ClearedSession, IssuedSession, SessionGuard, SessionId, SessionStore};
use crate::view::ViewRenderer;
use axum::response::Response;
use std::sync::Arc;

/// Maps incoming requests to controller actions and enforces the
/// access-control pipeline around them.
#[derive(Debug)]
pub struct Dispatcher {
    config: Arc<FrameworkConfig>,
    loader: Arc<SafeLoader>,
    registry: ControllerRegistry,
    guard: Arc<SessionGuard>,
    views: Arc<ViewRenderer>,
    csrf: CsrfGuard,
}

impl Dispatcher {
    /// Build a dispatcher with its own session store.
    #[must_use]
    pub fn new(config: Arc<FrameworkConfig>, registry: ControllerRegistry) -> Self {
        Self::with_store(config, registry, Arc::new(SessionStore::new()))
    }

    /// Build a dispatcher over a shared session store.
    #[must_use]
    pub fn with_store(
        config: Arc<FrameworkConfig>,
        registry: ControllerRegistry,
        store: Arc<SessionStore>,
    ) -> Self {
        let loader = Arc::new(SafeLoader::new(Arc::clone(&config)));
        let guard = Arc::new(SessionGuard::new(&config, store));
        let views = Arc::new(ViewRenderer::new(Arc::clone(&config), Arc::clone(&loader)));
        let csrf = CsrfGuard::new(config.csrf_level);
        Self {
            config,
            loader,
            registry,
            guard,
            views,
            csrf,
        }
    }

    /// The process configuration.
    #[must_use]
    pub fn config(&self) -> &Arc<FrameworkConfig> {
        &self.config
    }

    /// The allow-list loader backing views and file resources.
    #[must_use]
    pub fn loader(&self) -> &Arc<SafeLoader> {
        &self.loader
    }

    /// The session guard.
    #[must_use]
    pub fn guard(&self) -> &Arc<SessionGuard> {
        &self.guard
    }

    /// Handle one request end to end.
    ///
    /// Always produces a response: failures become the security
    /// response for the configured environment. A newly created or
    /// destroyed session is recorded in the response extensions for the
    /// session middleware to translate into cookie headers.
    pub async fn dispatch(&self, request: DispatchRequest) -> Response {
        let environment = self.config.environment;
        let mut issued: Option<SessionId> = None;
        let mut cleared = false;

        let mut response = match self.run(request, &mut issued, &mut cleared).await {
            Ok(response) => response,
            Err(error) => security_response(environment, &error),
        };

        if let Some(id) = issued {
            response.extensions_mut().insert(IssuedSession(id));
        }
        if cleared {
            response.extensions_mut().insert(ClearedSession);
        }
        response
    }

    async fn run(
        &self,
        request: DispatchRequest,
        issued: &mut Option<SessionId>,
        cleared: &mut bool,
    ) -> Result<Response, FrameworkError> {
        // RESOLVE_CONTROLLER
        let name = request
            .query_param(&self.config.controller_param)
            .unwrap_or(&self.config.default_controller)
            .to_string();

        // LOAD_CONTROLLER: explicit registry lookup; unknown controller
        // and denied load share one observable outcome.
        let controller = self.registry.resolve(&name).ok_or_else(|| {
            tracing::warn!(controller = %name, "no controller registered");
            FrameworkError::NotFound(format!("{}Controller", ucfirst(&name)))
        })?;

        // SETUP
        let default_action = controller
            .default_action()
            .unwrap_or(&self.config.default_action)
            .to_string();
        let action = request
            .query_param(&self.config.action_param)
            .unwrap_or(&default_action)
            .to_string();

        let mut safe_actions: Vec<String> =
            controller.safe_actions().iter().map(ToString::to_string).collect();
        if !safe_actions.contains(&default_action) {
            // The default action is always invocable.
            safe_actions.push(default_action);
        }

        let session = match controller.session_policy() {
            SessionPolicy::Stateless => None,
            policy @ (SessionPolicy::Required | SessionPolicy::Authenticated) => {
                let (session, created) = self.guard.init_session(request.session_id.as_ref());
                if created {
                    *issued = Some(session.id().clone());
                }
                if policy == SessionPolicy::Authenticated
                    && !(self.guard.has_session(session.id())
                        && controller.check_session(&session))
                {
                    tracing::warn!(controller = %name, "session check failed");
                    return Err(FrameworkError::PermissionDenied(format!(
                        "authentication required for controller '{name}'"
                    )));
                }
                Some(session)
            }
        };

        tracing::debug!(controller = %name, action = %action, "dispatching");
        let mut ctx = RequestContext::new(
            Arc::clone(&self.config),
            Arc::clone(&self.views),
            Arc::clone(&self.guard),
            self.csrf,
            request,
            name,
            action,
            session,
        );

        // CSRF_CHECK, only for actions the controller marked protected.
        if controller.csrf_protected_actions().contains(&ctx.action())
            && !self.csrf.verify(&ctx.request, ctx.session())
        {
            tracing::warn!(
                controller = %ctx.controller(),
                action = %ctx.action(),
                "token verification failed"
            );
            return Err(FrameworkError::CsrfInvalid);
        }

        // INVOKE_ACTION: capability allow-list, not a name lookup.
        if !safe_actions.iter().any(|safe| safe == ctx.action()) {
            tracing::warn!(
                controller = %ctx.controller(),
                action = %ctx.action(),
                "action not declared safe"
            );
            return Err(FrameworkError::UnknownAction(ctx.action().to_string()));
        }

        let action = ctx.action().to_string();
        let response = controller.invoke(&action, &mut ctx).await?;

        *cleared = ctx.session_destroyed();
        if let Some(session) = ctx.take_session() {
            self.guard.persist(session);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CsrfLevel, Environment};
    use crate::csrf::TOKEN_PARAM;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::response::{Html, IntoResponse};

    struct HomeController;

    #[async_trait]
    impl Controller for HomeController {
        fn safe_actions(&self) -> &[&str] {
            &["list"]
        }

        async fn invoke(
            &self,
            action: &str,
            _ctx: &mut RequestContext,
        ) -> Result<Response, FrameworkError> {
            match action {
                "view" => Ok(Html("home view").into_response()),
                "list" => Ok(Html("home list").into_response()),
                // Exists as a match arm but is never declared safe.
                "deleteAll" => Ok(Html("everything is gone").into_response()),
                other => Err(FrameworkError::NotFound(other.to_string())),
            }
        }
    }

    struct AccountController;

    #[async_trait]
    impl Controller for AccountController {
        fn safe_actions(&self) -> &[&str] {
            &["form", "transfer", "login", "logout"]
        }

        fn csrf_protected_actions(&self) -> &[&str] {
            &["transfer"]
        }

        fn session_policy(&self) -> SessionPolicy {
            SessionPolicy::Required
        }

        async fn invoke(
            &self,
            action: &str,
            ctx: &mut RequestContext,
        ) -> Result<Response, FrameworkError> {
            match action {
                "form" => Ok(Html(ctx.csrf_form_field()).into_response()),
                "transfer" => Ok(Html("transferred").into_response()),
                "login" => {
                    if let Some(session) = ctx.session_mut() {
                        session.set_authenticated(true);
                    }
                    Ok(Html("logged in").into_response())
                }
                "logout" => {
                    ctx.destroy_session();
                    Ok(Html("logged out").into_response())
                }
                other => Err(FrameworkError::NotFound(other.to_string())),
            }
        }
    }

    struct AdminController;

    #[async_trait]
    impl Controller for AdminController {
        fn safe_actions(&self) -> &[&str] {
            &["panel"]
        }

        fn session_policy(&self) -> SessionPolicy {
            SessionPolicy::Authenticated
        }

        async fn invoke(
            &self,
            _action: &str,
            _ctx: &mut RequestContext,
        ) -> Result<Response, FrameworkError> {
            Ok(Html("admin panel").into_response())
        }
    }

    fn dispatcher(csrf_level: CsrfLevel, environment: Environment) -> Dispatcher {
        let mut config = FrameworkConfig::default();
        config.csrf_level = csrf_level;
        config.environment = environment;

        let mut registry = ControllerRegistry::new();
        registry.register("home", || Box::new(HomeController));
        registry.register("account", || Box::new(AccountController));
        registry.register("admin", || Box::new(AdminController));
        Dispatcher::new(Arc::new(config), registry)
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_resolve_controller_and_action() {
        let dispatcher = dispatcher(CsrfLevel::None, Environment::Development);
        let response = dispatcher.dispatch(DispatchRequest::get()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "home view");
    }

    #[tokio::test]
    async fn test_empty_controller_param_falls_back_to_default() {
        let dispatcher = dispatcher(CsrfLevel::None, Environment::Development);
        let mut request = DispatchRequest::get();
        request.query.insert("controller".to_string(), String::new());
        let response = dispatcher.dispatch(request).await;
        assert_eq!(body_text(response).await, "home view");
    }

    #[tokio::test]
    async fn test_unknown_controller_is_denied() {
        let dispatcher = dispatcher(CsrfLevel::None, Environment::Production);
        let mut request = DispatchRequest::get();
        request.query.insert("controller".to_string(), "nope".to_string());
        let response = dispatcher.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_text(response).await;
        assert!(body.contains("Security prevention:"));
        assert!(!body.contains("NopeController"));
    }

    #[tokio::test]
    async fn test_undeclared_action_is_refused_even_if_it_exists() {
        let dispatcher = dispatcher(CsrfLevel::None, Environment::Development);
        let mut request = DispatchRequest::get();
        request.query.insert("action".to_string(), "deleteAll".to_string());
        let response = dispatcher.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_text(response).await.contains("deleteAll"));
    }

    #[tokio::test]
    async fn test_declared_action_is_invoked() {
        let dispatcher = dispatcher(CsrfLevel::None, Environment::Development);
        let mut request = DispatchRequest::get();
        request.query.insert("action".to_string(), "list".to_string());
        let response = dispatcher.dispatch(request).await;
        assert_eq!(body_text(response).await, "home list");
    }

    #[tokio::test]
    async fn test_new_session_is_issued_for_session_controllers() {
        let dispatcher = dispatcher(CsrfLevel::Basic, Environment::Development);
        let mut request = DispatchRequest::get();
        request.query.insert("controller".to_string(), "account".to_string());
        request.query.insert("action".to_string(), "form".to_string());

        let response = dispatcher.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let issued = response.extensions().get::<IssuedSession>().cloned();
        assert!(issued.is_some());
        assert!(dispatcher.guard().has_session(&issued.unwrap().0));
    }

    #[tokio::test]
    async fn test_csrf_protected_action_round_trip() {
        let dispatcher = dispatcher(CsrfLevel::Basic, Environment::Development);

        // First request arms the session and renders the token field.
        let mut request = DispatchRequest::get();
        request.query.insert("controller".to_string(), "account".to_string());
        request.query.insert("action".to_string(), "form".to_string());
        let response = dispatcher.dispatch(request).await;
        let session_id = response.extensions().get::<IssuedSession>().unwrap().0.clone();
        let field = body_text(response).await;
        let token = field
            .split("value=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap()
            .to_string();

        // Matching token passes.
        let mut request = DispatchRequest::post();
        request.session_id = Some(session_id.clone());
        request.query.insert("controller".to_string(), "account".to_string());
        request.query.insert("action".to_string(), "transfer".to_string());
        request.form.insert(TOKEN_PARAM.to_string(), token);
        let response = dispatcher.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "transferred");

        // Wrong token aborts before the action runs.
        let mut request = DispatchRequest::post();
        request.session_id = Some(session_id);
        request.query.insert("controller".to_string(), "account".to_string());
        request.query.insert("action".to_string(), "transfer".to_string());
        request.form.insert(TOKEN_PARAM.to_string(), "wrong".to_string());
        let response = dispatcher.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_text(response).await.contains("Not a valid request."));
    }

    #[tokio::test]
    async fn test_csrf_check_runs_before_safe_action_check() {
        let dispatcher = dispatcher(CsrfLevel::Basic, Environment::Production);
        let mut request = DispatchRequest::post();
        request.query.insert("controller".to_string(), "account".to_string());
        request.query.insert("action".to_string(), "transfer".to_string());
        let response = dispatcher.dispatch(request).await;
        assert!(body_text(response).await.contains("Not a valid request."));
    }

    #[tokio::test]
    async fn test_authenticated_policy_denies_fresh_session() {
        let dispatcher = dispatcher(CsrfLevel::None, Environment::Development);
        let mut request = DispatchRequest::get();
        request.query.insert("controller".to_string(), "admin".to_string());
        request.query.insert("action".to_string(), "panel".to_string());
        let response = dispatcher.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_authenticated_policy_admits_logged_in_session() {
        let dispatcher = dispatcher(CsrfLevel::None, Environment::Development);

        // Log in through the account controller.
        let mut request = DispatchRequest::post();
        request.query.insert("controller".to_string(), "account".to_string());
        request.query.insert("action".to_string(), "login".to_string());
        let response = dispatcher.dispatch(request).await;
        let session_id = response.extensions().get::<IssuedSession>().unwrap().0.clone();

        let mut request = DispatchRequest::get();
        request.session_id = Some(session_id);
        request.query.insert("controller".to_string(), "admin".to_string());
        request.query.insert("action".to_string(), "panel".to_string());
        let response = dispatcher.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "admin panel");
    }

    #[tokio::test]
    async fn test_logout_destroys_session_and_clears_cookie() {
        let dispatcher = dispatcher(CsrfLevel::None, Environment::Development);

        let mut request = DispatchRequest::post();
        request.query.insert("controller".to_string(), "account".to_string());
        request.query.insert("action".to_string(), "login".to_string());
        let response = dispatcher.dispatch(request).await;
        let session_id = response.extensions().get::<IssuedSession>().unwrap().0.clone();

        let mut request = DispatchRequest::post();
        request.session_id = Some(session_id.clone());
        request.query.insert("controller".to_string(), "account".to_string());
        request.query.insert("action".to_string(), "logout".to_string());
        let response = dispatcher.dispatch(request).await;
        assert!(response.extensions().get::<ClearedSession>().is_some());
        assert!(!dispatcher.guard().has_session(&session_id));
    }
}
