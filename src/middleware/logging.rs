//! Request logging middleware.
//!
//! Logs every HTTP request with method, path, status code, and latency.

use crate::middleware::chain::{Next, Stage};
use crate::middleware::client_ip;
use async_trait::async_trait;
use axum::{
    extract::{OriginalUri, Request},
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// Logs at INFO level for successful requests, WARN level for server errors.
/// Includes: route group, method, path, status code, latency in milliseconds.
pub struct LoggingStage {
    group: &'static str,
}

impl LoggingStage {
    pub fn new(group: &'static str) -> Self {
        Self { group }
    }
}

#[async_trait]
impl Stage for LoggingStage {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn process(&self, req: Request, next: Next<'_>) -> Response {
        let method = req.method().clone();
        // Nested groups see a stripped URI; log what the client asked for
        let path = req
            .extensions()
            .get::<OriginalUri>()
            .map(|uri| uri.0.path().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        let client_ip = client_ip(&req)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let span = tracing::info_span!(
            "http_request",
            group = self.group,
            method = %method,
            path = %path,
            client_ip = %client_ip,
        );

        let start = Instant::now();
        let response = next.run(req).instrument(span.clone()).await;
        let latency = start.elapsed();
        let status = response.status().as_u16();

        let _guard = span.enter();
        if status >= 500 {
            warn!(
                status = status,
                latency_ms = latency.as_millis() as u64,
                "Request failed (5xx)"
            );
        } else if status >= 400 {
            info!(
                status = status,
                latency_ms = latency.as_millis() as u64,
                "Request completed (4xx)"
            );
        } else {
            info!(
                status = status,
                latency_ms = latency.as_millis() as u64,
                "Request completed"
            );
        }

        response
    }
}
