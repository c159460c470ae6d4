//! The ephemeral per-request view of URL and body parameters.

use crate::session::SessionId;
use http::Method;
use std::collections::HashMap;

/// Parameters of one incoming request, as the dispatcher consumes them.
///
/// Derived per request and discarded with it. Controller and action
/// names are read from the query map only; the CSRF token may arrive in
/// either map (query first).
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Request method.
    pub method: Method,
    /// Query-string parameters.
    pub query: HashMap<String, String>,
    /// Body (form) parameters.
    pub form: HashMap<String, String>,
    /// Session identifier from the request cookie, if any.
    pub session_id: Option<SessionId>,
}

impl DispatchRequest {
    /// Empty request with the given method.
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: HashMap::new(),
            form: HashMap::new(),
            session_id: None,
        }
    }

    /// Empty GET request.
    #[must_use]
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// Empty POST request.
    #[must_use]
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// Read a parameter, query first, then body.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .or_else(|| self.form.get(name))
            .map(String::as_str)
    }

    /// Read a query parameter, treating the empty string as absent.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_prefers_query() {
        let mut request = DispatchRequest::post();
        request.query.insert("name".to_string(), "from-query".to_string());
        request.form.insert("name".to_string(), "from-form".to_string());
        assert_eq!(request.param("name"), Some("from-query"));

        request.query.remove("name");
        assert_eq!(request.param("name"), Some("from-form"));
        assert_eq!(request.param("absent"), None);
    }

    #[test]
    fn test_query_param_treats_empty_as_absent() {
        let mut request = DispatchRequest::get();
        request.query.insert("controller".to_string(), String::new());
        assert_eq!(request.query_param("controller"), None);
    }
}
