use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assigns a random UUID to requests that arrive without an `x-request-id`
///
/// The id shows up in the trace span and is echoed on the response, so a
/// browser-side failure can be matched to server logs.
#[derive(Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().hyphenated().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}
