//! Tower middleware.

pub mod session;

pub use session::{CookieConfig, SameSite, SessionCookie, SessionLayer};
