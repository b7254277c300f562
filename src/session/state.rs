use crate::auth::PrincipalId;
use chrono::{DateTime, Utc};
use std::fmt;

/// Outcome of resolving the session cookie on one request
///
/// Resolution finishes before any handler runs; there is no pending state.
#[derive(Debug, Clone)]
pub enum SessionState {
    Authenticated(ActiveSession),
    Unauthenticated(UnauthenticatedReason),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn principal_id(&self) -> Option<&PrincipalId> {
        match self {
            Self::Authenticated(session) => Some(&session.principal_id),
            Self::Unauthenticated(_) => None,
        }
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        match self {
            Self::Authenticated(session) => Some(session),
            Self::Unauthenticated(_) => None,
        }
    }
}

/// Why a request ended up unauthenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    NoCookie,
    /// Cookie present but its signature did not verify
    InvalidCookie,
    SessionMissing,
    Expired,
    /// Session exists but no principal is bound to it
    Anonymous,
    /// Cookie arrived from an origin the CORS policy does not allow
    OriginRejected,
}

impl UnauthenticatedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCookie => "no_cookie",
            Self::InvalidCookie => "invalid_cookie",
            Self::SessionMissing => "session_missing",
            Self::Expired => "expired",
            Self::Anonymous => "anonymous",
            Self::OriginRejected => "origin_rejected",
        }
    }
}

/// A live session bound to a principal
#[derive(Clone)]
pub struct ActiveSession {
    pub(crate) session_id: String,
    pub principal_id: PrincipalId,
    /// Expiry after this request's sliding bump
    pub expires_at: DateTime<Utc>,
}

impl ActiveSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

// Keeps session identifiers out of logs
impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("session_id", &"[redacted]")
            .field("principal_id", &self.principal_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_session_id() {
        let state = SessionState::Authenticated(ActiveSession {
            session_id: "very-secret-id".into(),
            principal_id: PrincipalId::new("u1"),
            expires_at: Utc::now(),
        });
        let debug = format!("{:?}", state);
        assert!(!debug.contains("very-secret-id"));
        assert!(debug.contains("u1"));
        assert_eq!(state.principal_id(), Some(&PrincipalId::new("u1")));
    }
}
