use super::manager::SessionManager;
use super::state::{SessionState, UnauthenticatedReason};
use crate::cors::CorsPolicy;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// State for the session middleware
///
/// # Example
///
/// ```rust,ignore
/// let gate = SessionGate::new(manager, cors_policy);
/// let api = Router::new()
///     .route("/user/current", get(current_user))
///     .layer(axum::middleware::from_fn_with_state(gate, resolve_session));
/// ```
#[derive(Clone)]
pub struct SessionGate {
    manager: Arc<SessionManager>,
    cors: Arc<CorsPolicy>,
}

impl SessionGate {
    pub fn new(manager: Arc<SessionManager>, cors: Arc<CorsPolicy>) -> Self {
        Self { manager, cors }
    }
}

/// Resolve the session for every request it wraps
///
/// Inserts a [`SessionState`] into request extensions. Cookies arriving from
/// an origin the CORS policy does not allow are ignored. On authenticated
/// requests the response carries a refreshed session cookie unless the
/// handler already set one. A store failure ends the request with 503.
pub async fn resolve_session(State(gate): State<SessionGate>, mut request: Request, next: Next) -> Response {
    let origin_allowed = gate.cors.honors_session_from(request.headers().get(header::ORIGIN));

    let state = if origin_allowed {
        match gate.manager.resolve(request.headers()).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(
                    backend = gate.manager.store().backend_name(),
                    error = %e,
                    "Session resolution failed"
                );
                return e.into_response();
            }
        }
    } else {
        SessionState::Unauthenticated(UnauthenticatedReason::OriginRejected)
    };

    match &state {
        SessionState::Authenticated(active) => {
            tracing::debug!(
                session.state = "authenticated",
                principal_id = %active.principal_id,
                "Session resolved"
            );
        }
        SessionState::Unauthenticated(reason) => {
            tracing::debug!(
                session.state = "unauthenticated",
                reason = reason.as_str(),
                "Session resolved"
            );
        }
    }

    request.extensions_mut().insert(state.clone());
    let mut response = next.run(request).await;

    if let SessionState::Authenticated(active) = &state {
        if !sets_cookie(&response, gate.manager.cookie_name()) {
            match gate.manager.refreshed_cookie(active) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::warn!(error = %e, "Failed to build rolling session cookie"),
            }
        }
    }

    response
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.as_bytes().starts_with(prefix.as_bytes()))
}
