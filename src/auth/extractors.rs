use crate::auth::PrincipalId;
use crate::error::AppError;
use crate::session::SessionState;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::future::Future;

/// Axum extractor for the authenticated principal
///
/// Rejects with 401 when the request has no authenticated session.
///
/// # Example
///
/// ```rust,ignore
/// async fn list_workspaces(CurrentPrincipal(principal_id): CurrentPrincipal) -> Json<Vec<Workspace>> {
///     // principal_id is guaranteed present here
/// }
/// ```
pub struct CurrentPrincipal(pub PrincipalId);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let principal = principal_from_parts(parts);
        async move { principal.map(CurrentPrincipal).ok_or(AppError::Unauthenticated) }
    }
}

/// Axum extractor for routes that serve both anonymous and signed-in callers
pub struct OptionalPrincipal(pub Option<PrincipalId>);

impl<S> FromRequestParts<S> for OptionalPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let principal = principal_from_parts(parts);
        async move { Ok(OptionalPrincipal(principal)) }
    }
}

// Prefer the id bound by RequireAuth, fall back to the resolved session
fn principal_from_parts(parts: &Parts) -> Option<PrincipalId> {
    parts
        .extensions
        .get::<PrincipalId>()
        .cloned()
        .or_else(|| {
            parts
                .extensions
                .get::<SessionState>()
                .and_then(|state| state.principal_id().cloned())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UnauthenticatedReason;
    use axum::http::Request;

    #[tokio::test]
    async fn test_current_principal_from_extension() {
        let (mut parts, _) = Request::new(()).into_parts();
        parts.extensions.insert(PrincipalId::new("u1"));

        let CurrentPrincipal(id) = CurrentPrincipal::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_current_principal_rejects_anonymous() {
        let (mut parts, _) = Request::new(()).into_parts();
        parts
            .extensions
            .insert(SessionState::Unauthenticated(UnauthenticatedReason::NoCookie));

        let result = CurrentPrincipal::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthenticated)));

        let OptionalPrincipal(id) = OptionalPrincipal::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(id.is_none());
    }
}
