//! CORS middleware.
//!
//! Reflects the request `Origin` only when it is on the allow-list and answers
//! preflight `OPTIONS` requests without reaching later stages.

use crate::middleware::chain::{Next, Stage};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::Response,
};
use std::sync::Arc;

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Origin, Content-Type, Accept, Authorization";

/// Origins allowed to make credentialed cross-origin calls.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_origins: origins
                .into_iter()
                .map(Into::into)
                .filter(|o: &String| !o.trim().is_empty())
                .collect(),
        }
    }

    /// Exact, case-sensitive match.
    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }

    pub fn origins(&self) -> &[String] {
        &self.allowed_origins
    }

    fn apply(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        if let Some(origin) = origin {
            if origin.to_str().map(|o| self.allows(o)).unwrap_or(false) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
                headers.append(header::VARY, HeaderValue::from_static("Origin"));
            }
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
    }
}

pub struct CorsStage {
    policy: Arc<CorsPolicy>,
}

impl CorsStage {
    pub fn new(policy: Arc<CorsPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn process(&self, req: Request, next: Next<'_>) -> Response {
        let origin = req.headers().get(header::ORIGIN).cloned();

        let mut response = if req.method() == Method::OPTIONS {
            let mut preflight = Response::new(Body::empty());
            *preflight.status_mut() = StatusCode::OK;
            preflight
        } else {
            next.run(req).await
        };

        self.policy.apply(origin.as_ref(), response.headers_mut());
        response
    }
}
