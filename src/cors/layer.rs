use super::policy::{CorsPolicy, OriginRule};
use axum::http::{HeaderValue, request::Parts};
use tower_http::cors::{AllowCredentials, AllowHeaders, AllowOrigin, CorsLayer};

/// Build a tower-http CorsLayer from a validated CorsPolicy
///
/// Returns `None` for same-origin deployments. The layer answers every
/// `OPTIONS` request itself, so preflights never reach the session layer
/// or a handler. `Access-Control-Allow-Credentials` is emitted only when the
/// request's `Origin` is the configured origin.
pub fn build_cors_layer(policy: &CorsPolicy) -> Option<CorsLayer> {
    let mut layer = match policy.origin() {
        OriginRule::SameOrigin => return None,
        OriginRule::Any => CorsLayer::new().allow_origin(AllowOrigin::any()),
        OriginRule::Exact(origin) => CorsLayer::new().allow_origin(AllowOrigin::exact(origin.clone())),
    };

    layer = layer.allow_methods(policy.methods().to_vec());

    layer = if policy.allows_any_header() {
        layer.allow_headers(AllowHeaders::any())
    } else {
        layer.allow_headers(policy.headers().to_vec())
    };

    if !policy.exposed_headers().is_empty() {
        layer = layer.expose_headers(policy.exposed_headers().to_vec());
    }

    if let OriginRule::Exact(allowed) = policy.origin() {
        if policy.allows_credentials() {
            let allowed = allowed.clone();
            layer = layer.allow_credentials(AllowCredentials::predicate(
                move |origin: &HeaderValue, _parts: &Parts| *origin == allowed,
            ));
        }
    }

    Some(layer.max_age(policy.max_age()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cors::CorsConfig;
    use axum::{Router, body::Body, http::{Method, Request, StatusCode}, routing::get};
    use tower::ServiceExt;

    fn app(policy: &CorsPolicy) -> Router {
        let layer = build_cors_layer(policy).expect("layer");
        Router::new().route("/ping", get(|| async { "pong" })).layer(layer)
    }

    fn policy() -> CorsPolicy {
        CorsPolicy::from_config(&CorsConfig::for_origin("https://app.example.com")).unwrap()
    }

    #[test]
    fn test_same_origin_has_no_layer() {
        let policy = CorsPolicy::from_config(&CorsConfig::default()).unwrap();
        assert!(build_cors_layer(&policy).is_none());
    }

    #[tokio::test]
    async fn test_allowed_origin_gets_credentials() {
        let response = app(&policy())
            .oneshot(
                Request::get("/ping")
                    .header("origin", "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://app.example.com"
        );
        assert_eq!(
            response.headers().get("access-control-allow-credentials").unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_foreign_origin_never_gets_credentials() {
        let response = app(&policy())
            .oneshot(
                Request::get("/ping")
                    .header("origin", "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get("access-control-allow-credentials").is_none());
    }

    #[tokio::test]
    async fn test_preflight_is_answered_by_layer() {
        let response = app(&policy())
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/ping")
                    .header("origin", "https://app.example.com")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let methods = response
            .headers()
            .get("access-control-allow-methods")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(methods.contains("POST"));
        assert!(methods.contains("DELETE"));
    }
}
