//! Session lifecycle and the session guard.
//!
//! Sessions are created on first [`SessionGuard::init_session`] call and
//! destroyed only by an explicit [`SessionGuard::destroy_session`],
//! never implicitly. The CSRF token is generated here, from a
//! cryptographically secure source, when the configured level requires
//! one.

use crate::config::{CsrfLevel, FrameworkConfig};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Token and session-id length in raw bytes before encoding.
const ID_BYTES: usize = 32;

/// Encoded length of a 32-byte URL-safe base64 value without padding.
const ENCODED_LEN: usize = 43;

/// Opaque session identifier carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier from the OS-seeded RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_token())
    }

    /// The identifier as a cookie-safe string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error parsing a session identifier from untrusted cookie input.
#[derive(Debug, thiserror::Error)]
#[error("malformed session identifier")]
pub struct InvalidSessionId;

impl FromStr for SessionId {
    type Err = InvalidSessionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == ENCODED_LEN
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidSessionId)
        }
    }
}

/// Key-value store scoped to one browser session.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    name: String,
    started_at: DateTime<Utc>,
    csrf_token: Option<String>,
    authenticated: bool,
    values: HashMap<String, serde_json::Value>,
}

impl Session {
    fn new(name: &str, csrf_level: CsrfLevel) -> Self {
        Self {
            id: SessionId::generate(),
            name: name.to_string(),
            started_at: Utc::now(),
            csrf_token: csrf_level.is_enabled().then(random_token),
            authenticated: false,
            values: HashMap::new(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// The session name this session was created under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First-touch creation timestamp; never reset.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The session's CSRF token, present only when the configured level
    /// requires one.
    #[must_use]
    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    /// Whether a login has marked this session authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Mark the session authenticated (login) or not (logout).
    pub const fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// Read a value from the session.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Store a value in the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn insert<T: Serialize>(&mut self, key: String, value: T) -> Result<(), serde_json::Error> {
        self.values.insert(key, serde_json::to_value(value)?);
        Ok(())
    }

    /// Remove a value from the session.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }
}

/// In-process session storage, keyed by session identifier.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a session snapshot by identifier.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Insert or replace a session.
    pub fn insert(&self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    /// Remove a session; returns whether one existed.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Marker inserted into response extensions when a new session was
/// created during dispatch; the session middleware turns it into a
/// `Set-Cookie` header.
#[derive(Debug, Clone)]
pub struct IssuedSession(pub SessionId);

/// Marker inserted into response extensions when the session was
/// destroyed during dispatch; the session middleware expires the cookie.
#[derive(Debug, Clone, Copy)]
pub struct ClearedSession;

/// Initializes, checks and destroys named sessions.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    store: Arc<SessionStore>,
    session_name: String,
    csrf_level: CsrfLevel,
}

impl SessionGuard {
    /// Build a guard over a session store.
    #[must_use]
    pub fn new(config: &FrameworkConfig, store: Arc<SessionStore>) -> Self {
        Self {
            store,
            session_name: config.session_name.clone(),
            csrf_level: config.csrf_level,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Attach the identified session, or create a new one under the
    /// configured session name.
    ///
    /// Idempotent per session: `started_at` is first-touch only and an
    /// existing CSRF token is never regenerated. Returns the session
    /// and whether it was newly created. Two requests racing to create
    /// the same brand-new session resolve first-writer-wins in the
    /// store; the losing snapshot is simply replaced on write-back.
    #[must_use]
    pub fn init_session(&self, existing: Option<&SessionId>) -> (Session, bool) {
        if let Some(id) = existing {
            if let Some(mut session) = self.store.get(id) {
                if session.name == self.session_name {
                    if session.csrf_token.is_none() && self.csrf_level.is_enabled() {
                        session.csrf_token = Some(random_token());
                        self.store.insert(session.clone());
                    }
                    return (session, false);
                }
            }
        }

        let session = Session::new(&self.session_name, self.csrf_level);
        tracing::debug!(session = %session.id, "created session");
        self.store.insert(session.clone());
        (session, true)
    }

    /// True iff a live session exists for the identifier and matches
    /// the configured session name.
    #[must_use]
    pub fn has_session(&self, id: &SessionId) -> bool {
        self.store
            .get(id)
            .is_some_and(|session| session.name == self.session_name)
    }

    /// Invalidate the session. Safe to call on an already-destroyed
    /// session; subsequent [`Self::has_session`] calls return false.
    pub fn destroy_session(&self, id: &SessionId) {
        if self.store.remove(id) {
            tracing::debug!(session = %id, "destroyed session");
        }
    }

    /// Write a modified session snapshot back to the store, unless the
    /// session was destroyed in the meantime.
    pub fn persist(&self, session: Session) {
        if self.store.get(&session.id).is_some() {
            self.store.insert(session);
        }
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(level: CsrfLevel) -> SessionGuard {
        let mut config = FrameworkConfig::default();
        config.csrf_level = level;
        SessionGuard::new(&config, Arc::new(SessionStore::new()))
    }

    #[test]
    fn test_init_creates_session_with_token_when_enabled() {
        let guard = guard(CsrfLevel::Basic);
        let (session, created) = guard.init_session(None);
        assert!(created);
        let token = session.csrf_token().unwrap();
        assert_eq!(token.len(), ENCODED_LEN);
    }

    #[test]
    fn test_init_skips_token_when_disabled() {
        let guard = guard(CsrfLevel::None);
        let (session, _) = guard.init_session(None);
        assert!(session.csrf_token().is_none());
    }

    #[test]
    fn test_init_is_idempotent_per_session() {
        let guard = guard(CsrfLevel::Paranoid);
        let (first, created) = guard.init_session(None);
        assert!(created);

        let (second, created) = guard.init_session(Some(first.id()));
        assert!(!created);
        assert_eq!(second.started_at(), first.started_at());
        assert_eq!(second.csrf_token(), first.csrf_token());
    }

    #[test]
    fn test_has_session_requires_matching_name() {
        let store = Arc::new(SessionStore::new());
        let config = FrameworkConfig::default();
        let guard = SessionGuard::new(&config, Arc::clone(&store));
        let (session, _) = guard.init_session(None);
        assert!(guard.has_session(session.id()));

        let mut other_config = FrameworkConfig::default();
        other_config.session_name = "other-app".to_string();
        let other_guard = SessionGuard::new(&other_config, store);
        assert!(!other_guard.has_session(session.id()));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let guard = guard(CsrfLevel::Basic);
        let (session, _) = guard.init_session(None);
        guard.destroy_session(session.id());
        assert!(!guard.has_session(session.id()));
        // No-op, not an error.
        guard.destroy_session(session.id());
    }

    #[test]
    fn test_persist_does_not_resurrect_destroyed_session() {
        let guard = guard(CsrfLevel::Basic);
        let (mut session, _) = guard.init_session(None);
        guard.destroy_session(session.id());
        session.set_authenticated(true);
        guard.persist(session.clone());
        assert!(!guard.has_session(session.id()));
    }

    #[test]
    fn test_session_ids_are_unique() {
        let guard = guard(CsrfLevel::None);
        let (a, _) = guard.init_session(None);
        let (b, _) = guard.init_session(None);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_session_id_parse_rejects_malformed() {
        assert!(SessionId::from_str("short").is_err());
        assert!(SessionId::from_str(&"a".repeat(ENCODED_LEN - 1)).is_err());
        assert!(SessionId::from_str(&"a/b".repeat(20)).is_err());

        let generated = SessionId::generate();
        assert_eq!(
            SessionId::from_str(generated.as_str()).unwrap(),
            generated
        );
    }

    #[test]
    fn test_session_values_round_trip() {
        let guard = guard(CsrfLevel::None);
        let (mut session, _) = guard.init_session(None);
        session.insert("user_id".to_string(), 42_i64).unwrap();
        guard.persist(session.clone());

        let reloaded = guard.store().get(session.id()).unwrap();
        assert_eq!(reloaded.get::<i64>("user_id"), Some(42));
        assert_eq!(reloaded.get::<i64>("missing"), None);
    }
}
