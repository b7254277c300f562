//! Alba-style HTTP scenarios for exercising the router without a server
//!
//! Scenarios carry the two request headers the session layer cares about,
//! `Cookie` and `Origin`, so a test can replay a browser that logged in from
//! the configured front end.
//!
//! # Example
//!
//! ```rust,ignore
//! use projecthub::testing;
//!
//! let login = testing::post(app.clone(), "/api/auth/login")
//!     .origin("https://app.example.com")
//!     .json_body(&json!({"email": "ada@example.com", "password": "pw"}))
//!     .execute()
//!     .await
//!     .assert_ok();
//! let cookie = login.cookie_pair("sessionId").unwrap();
//!
//! testing::get(app, "/api/user/current")
//!     .cookie(&cookie)
//!     .execute()
//!     .await
//!     .assert_ok();
//! ```

use axum::{
    Router,
    body::Body,
    http::{HeaderName, Method, Request, StatusCode, header},
};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;

/// Request builder for one call against a router
pub struct Scenario {
    app: Router,
    request: Request<Body>,
}

impl Scenario {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            request: Request::builder()
                .method(Method::GET)
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        *self.request.method_mut() = method;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        *self.request.uri_mut() = uri.parse().unwrap();
        self
    }

    /// Set a header, replacing any previous value
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.request.headers_mut().insert(
            HeaderName::from_bytes(key.as_bytes()).unwrap(),
            value.parse().unwrap(),
        );
        self
    }

    /// Send the request from a browser page at `origin`
    pub fn origin(self, origin: &str) -> Self {
        self.header("origin", origin)
    }

    /// Attach a `name=value` cookie pair
    ///
    /// Repeated calls accumulate into a single `Cookie` header.
    pub fn cookie(mut self, pair: &str) -> Self {
        let combined = match self.request.headers().get(header::COOKIE) {
            Some(existing) => format!("{}; {}", existing.to_str().unwrap(), pair),
            None => pair.to_string(),
        };
        self.request
            .headers_mut()
            .insert(header::COOKIE, combined.parse().unwrap());
        self
    }

    pub fn with_query(mut self, params: &[(&str, &str)]) -> Self {
        let uri = self.request.uri().clone();
        let mut query_parts = vec![];

        if let Some(query) = uri.query() {
            query_parts.push(query.to_string());
        }

        for (key, value) in params {
            query_parts.push(format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)));
        }

        let path = uri.path();
        let new_uri = if query_parts.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, query_parts.join("&"))
        };

        *self.request.uri_mut() = new_uri.parse().unwrap();
        self
    }

    /// Set JSON body from a serializable type
    pub fn json_body<T: Serialize>(mut self, body: &T) -> Self {
        let json = serde_json::to_string(body).unwrap();
        *self.request.body_mut() = Body::from(json);
        self.request
            .headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        self
    }

    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        *self.request.body_mut() = Body::from(body.into());
        self
    }

    /// Execute the request and get an assertion builder
    pub async fn execute(self) -> ScenarioAssert {
        let response = self.app.oneshot(self.request).await.unwrap();
        ScenarioAssert { response }
    }
}

/// Assertion builder for test responses
pub struct ScenarioAssert {
    response: axum::response::Response,
}

impl ScenarioAssert {
    /// Assert the response status code
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.response.status(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.response.status()
        );
        self
    }

    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    pub fn assert_unauthorized(self) -> Self {
        self.assert_status(StatusCode::UNAUTHORIZED)
    }

    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    pub fn assert_service_unavailable(self) -> Self {
        self.assert_status(StatusCode::SERVICE_UNAVAILABLE)
    }

    /// Assert a header exists with the given value
    pub fn assert_header(self, key: &str, expected: &str) -> Self {
        let value = self
            .header(key)
            .unwrap_or_else(|| panic!("Header '{}' not found", key));
        assert_eq!(value, expected, "Header '{}' value mismatch", key);
        self
    }

    /// Assert a header is absent
    pub fn assert_no_header(self, key: &str) -> Self {
        assert!(
            self.response.headers().get(key).is_none(),
            "Header '{}' should be absent, got {:?}",
            key,
            self.response.headers().get(key)
        );
        self
    }

    /// Assert the response content type is JSON
    pub fn assert_json(self) -> Self {
        let content_type = self
            .header(header::CONTENT_TYPE.as_str())
            .expect("Content-Type header not found");
        assert!(
            content_type.contains("application/json"),
            "Expected JSON content type, got: {}",
            content_type
        );
        self
    }

    /// First value of a response header
    pub fn header(&self, key: &str) -> Option<String> {
        self.response
            .headers()
            .get(key)
            .map(|v| v.to_str().unwrap().to_string())
    }

    /// Every `Set-Cookie` header on the response
    pub fn set_cookies(&self) -> Vec<String> {
        self.response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    /// The raw `Set-Cookie` header for `name`
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.set_cookies().into_iter().find(|c| c.starts_with(&prefix))
    }

    /// The `name=value` pair of a `Set-Cookie`, ready to replay with
    /// [`Scenario::cookie`]
    pub fn cookie_pair(&self, name: &str) -> Option<String> {
        self.set_cookie(name)
            .map(|c| c.split(';').next().unwrap_or_default().trim().to_string())
    }

    pub async fn body_bytes(self) -> Vec<u8> {
        axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    pub async fn body_string(self) -> String {
        String::from_utf8(self.body_bytes().await).unwrap()
    }

    /// Parse the JSON response body into a type
    pub async fn json<T: for<'de> Deserialize<'de>>(self) -> T {
        let bytes = self.body_bytes().await;
        serde_json::from_slice(&bytes).expect("Failed to parse JSON response")
    }

    /// Assert a JSON field using dot notation (`user.email`, `checks.1.name`)
    pub async fn assert_json_path(self, path: &str, expected: serde_json::Value) -> Self {
        let (parts, body) = self.response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let actual =
            json_path_get(&json, path).unwrap_or_else(|| panic!("Path '{}' not found in JSON", path));
        assert_eq!(actual, &expected, "JSON path '{}' value mismatch", path);

        Self {
            response: axum::response::Response::from_parts(parts, Body::from(bytes)),
        }
    }

    /// Dump the response for debugging
    pub async fn dump(self) -> Self {
        let (parts, body) = self.response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();

        eprintln!("=== Response Dump ===");
        eprintln!("Status: {}", parts.status);
        eprintln!("Headers:");
        for (key, value) in &parts.headers {
            eprintln!("  {}: {}", key, value.to_str().unwrap_or("<invalid>"));
        }
        eprintln!("Body: {}", String::from_utf8_lossy(&bytes));
        eprintln!("===================");

        Self {
            response: axum::response::Response::from_parts(parts, Body::from(bytes)),
        }
    }

    /// Get the underlying response for custom assertions
    pub fn response(self) -> axum::response::Response {
        self.response
    }
}

fn json_path_get<'a>(json: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = json;

    for part in path.split('.') {
        if let Ok(index) = part.parse::<usize>() {
            current = current.get(index)?;
        } else {
            current = current.get(part)?;
        }
    }

    Some(current)
}

pub fn get(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::GET).uri(uri)
}

pub fn post(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::POST).uri(uri)
}

pub fn put(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::PUT).uri(uri)
}

pub fn delete(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::DELETE).uri(uri)
}

/// CORS preflight for `uri`
pub fn preflight(app: Router, uri: &str, origin: &str, method: Method) -> Scenario {
    Scenario::new(app)
        .method(Method::OPTIONS)
        .uri(uri)
        .origin(origin)
        .header("access-control-request-method", method.as_str())
}
