use crate::auth::PrincipalId;
use crate::error::AppError;
use crate::session::SessionState;
use axum::{extract::Request, middleware::Next, response::Response};

/// Middleware that requires an authenticated session for all routes it wraps
///
/// Reads the [`SessionState`] resolved by the session layer and never
/// touches the session store itself. Authenticated requests get the
/// [`PrincipalId`] in their extensions; everything else is answered with 401
/// before the handler runs.
///
/// # Example
///
/// ```rust,ignore
/// use axum::Router;
/// use projecthub::auth::RequireAuth;
///
/// let protected_routes = Router::new()
///     .route("/workspaces", get(list_workspaces))
///     .route_layer(axum::middleware::from_fn(RequireAuth::middleware));
/// ```
pub struct RequireAuth;

impl RequireAuth {
    pub async fn middleware(mut request: Request, next: Next) -> Result<Response, AppError> {
        let principal_id = request
            .extensions()
            .get::<SessionState>()
            .ok_or_else(|| AppError::internal("Session state not found in request extensions"))?
            .principal_id()
            .cloned();

        match principal_id {
            Some(principal_id) => {
                request.extensions_mut().insert::<PrincipalId>(principal_id);
                Ok(next.run(request).await)
            }
            None => {
                tracing::debug!(
                    auth.decision = "rejected",
                    path = %request.uri().path(),
                    "Unauthenticated request to protected route"
                );
                Err(AppError::Unauthenticated)
            }
        }
    }
}
