use super::extractors::CurrentPrincipal;
use super::principal::{Principal, PrincipalSummary};
use super::provider::{AuthFailure, Credentials};
use crate::app::AppContext;
use crate::error::{AppError, Result};
use crate::http::RouteModule;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub provider: String,
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub message: String,
    pub user: PrincipalSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    pub user: PrincipalSummary,
}

/// Public authentication routes: login, provider callback and logout
pub fn auth_routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/oauth/callback", post(oauth_callback))
        .route("/auth/logout", post(logout))
}

/// Protected user routes
pub struct UserModule;

impl RouteModule for UserModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new().route("/current", get(current_user))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/user")
    }
}

async fn login(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Response> {
    let credentials = Credentials::Password {
        email: body.email,
        password: body.password,
    };

    let principal = ctx
        .local
        .authenticate(&credentials)
        .await
        .map_err(|failure| rejected(ctx.local.name(), failure))?;

    issue_session(&ctx, &headers, principal).await
}

async fn oauth_callback(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(body): Json<CallbackRequest>,
) -> Result<Response> {
    let verifier = ctx
        .delegated
        .clone()
        .ok_or_else(|| AppError::not_found("No delegated identity provider configured"))?;

    let credentials = Credentials::ProviderToken {
        provider: body.provider,
        access_token: body.access_token,
    };

    let principal = verifier
        .authenticate(&credentials)
        .await
        .map_err(|failure| rejected(verifier.name(), failure))?;

    issue_session(&ctx, &headers, principal).await
}

async fn logout(State(ctx): State<AppContext>, headers: HeaderMap) -> Result<Response> {
    if ctx.cors.honors_session_from(headers.get(header::ORIGIN)) {
        if let Some(session_id) = ctx.sessions.session_cookie_from_headers(&headers).into_session_id() {
            ctx.sessions.revoke(session_id).await?;
            tracing::debug!(auth.decision = "logged_out", "Session revoked");
        }
    }

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, ctx.sessions.removal_cookie()?)],
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
        .into_response())
}

async fn current_user(
    State(ctx): State<AppContext>,
    CurrentPrincipal(principal_id): CurrentPrincipal,
) -> Result<Json<CurrentUserResponse>> {
    let principal = ctx
        .accounts
        .find_by_id(&principal_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    Ok(Json(CurrentUserResponse {
        user: principal.summary(),
    }))
}

async fn issue_session(ctx: &AppContext, headers: &HeaderMap, principal: Principal) -> Result<Response> {
    // Only a cookie the session layer would honor may be replaced
    let previous = if ctx.cors.honors_session_from(headers.get(header::ORIGIN)) {
        ctx.sessions.session_cookie_from_headers(headers).into_session_id()
    } else {
        None
    };

    let issued = ctx.sessions.establish(&principal.id, previous).await?;
    tracing::debug!(
        auth.decision = "authenticated",
        principal_id = %issued.principal_id,
        provider = %principal.provider.provider,
        "Session established"
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, issued.set_cookie)],
        Json(SessionResponse {
            message: "Logged in successfully".to_string(),
            user: principal.summary(),
        }),
    )
        .into_response())
}

fn rejected(verifier: &'static str, failure: AuthFailure) -> AppError {
    match &failure {
        AuthFailure::ProviderError(detail) => {
            tracing::warn!(auth.decision = "failed", verifier, error = %detail, "Identity provider error");
        }
        _ => {
            tracing::info!(auth.decision = "rejected", verifier, reason = failure.as_str(), "Login rejected");
        }
    }
    failure.into()
}
