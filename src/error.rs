use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for projecthub
///
/// Authentication failures deliberately collapse into a small set of
/// client-visible bodies: a response never reveals whether a session was
/// missing, expired or forged, nor which login factor was wrong.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No valid session on a protected route
    #[error("Unauthenticated")]
    Unauthenticated,

    /// A login attempt failed
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The session backend could not be reached
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    /// Startup configuration violates an invariant
    #[error("Misconfigured policy: {0}")]
    MisconfiguredPolicy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Standard error response body.
///
/// Keys are camelCase (`errorCode`, `errorId`) to match what the browser
/// client reads.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    error: String,
    error_code: &'static str,
    error_id: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn misconfigured(msg: impl Into<String>) -> Self {
        Self::MisconfiguredPolicy(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable(_) | Self::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::MisconfiguredPolicy(_) | Self::Internal(_) | Self::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code the browser client branches on.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::StoreUnavailable(_) | Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::MisconfiguredPolicy(_) | Self::Internal(_) | Self::Anyhow(_) => {
                "INTERNAL_SERVER_ERROR"
            }
        }
    }

    /// Returns a safe error message suitable for client responses.
    ///
    /// Server errors (5xx) never expose their detail (CWE-209); the full
    /// error is logged server-side under the same `error_id`.
    fn safe_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Unauthorized".to_string(),
            Self::InvalidCredentials => "Invalid credentials".to_string(),
            Self::NotFound(msg) => format!("Not found: {}", msg),
            Self::BadRequest(msg) => format!("Bad request: {}", msg),

            Self::StoreUnavailable(_) | Self::ServiceUnavailable(_) => {
                "Service unavailable".to_string()
            }
            Self::MisconfiguredPolicy(_) | Self::Internal(_) | Self::Anyhow(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(
                status = status.as_u16(),
                error_id = %error_id,
                error_code = self.error_code(),
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: self.safe_message(),
            error_code: self.error_code(),
            error_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for projecthub handlers
pub type Result<T> = std::result::Result<T, AppError>;
