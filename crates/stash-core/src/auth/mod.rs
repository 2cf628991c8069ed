//! Authentication capability consumed by the sync engine.
//!
//! Sign-in itself happens elsewhere; the engine only asks whether a user is
//! currently authenticated and who they are.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::util::now_secs;

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= now_secs() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// "Is a user authenticated, and who are they"
pub trait AuthState: Send + Sync {
    fn current_user(&self) -> Option<AuthUser>;

    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }
}

/// Shared, swappable session slot.
///
/// Clones observe the same session, so signing in or out through one handle is
/// seen by every component holding another.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<AuthSession>>>,
}

impl SessionHandle {
    #[must_use]
    pub fn new(session: Option<AuthSession>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub fn set(&self, session: Option<AuthSession>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    /// The current session, if any and not expired
    #[must_use]
    pub fn session(&self) -> Option<AuthSession> {
        let guard = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone().filter(|session| !session.is_expired())
    }
}

impl AuthState for SessionHandle {
    fn current_user(&self) -> Option<AuthUser> {
        self.session().map(|session| session.user)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionHandle")
            .field("user", &self.current_user())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_session(user_id: &str) -> AuthSession {
    AuthSession {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: now_secs() + 3600,
        user: AuthUser {
            id: user_id.to_string(),
            email: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_debug_redacts_tokens() {
        let session = AuthSession {
            access_token: "secret-access-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: "user".to_string(),
                email: None,
            },
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-access-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn handle_reports_signed_in_user() {
        let handle = SessionHandle::default();
        assert!(!handle.is_authenticated());

        let observer = handle.clone();
        handle.set(Some(test_session("u1")));
        assert_eq!(observer.current_user().map(|user| user.id).as_deref(), Some("u1"));

        handle.set(None);
        assert!(!observer.is_authenticated());
    }

    #[test]
    fn expired_session_is_unauthenticated() {
        let mut session = test_session("u1");
        session.expires_at = now_secs() - 10;
        let handle = SessionHandle::new(Some(session));
        assert!(!handle.is_authenticated());
    }
}
