//! Request pipeline stages.
//!
//! This module provides:
//! - The chain builder that composes stages around a route group
//! - Request logging with latency tracking
//! - Rate limiting per IP address
//! - CORS allow-list handling

pub mod chain;
pub mod cors;
pub mod logging;
pub mod rate_limit;

pub use chain::{ChainBuilder, Next, Pipeline, Stage};
pub use cors::{CorsPolicy, CorsStage};
pub use logging::LoggingStage;
pub use rate_limit::{IpRateLimiter, RateLimitConfig, RateLimitStage};

use axum::extract::{ConnectInfo, Request};
use std::net::{IpAddr, SocketAddr};

/// Peer address recorded by the server for this connection, if any.
pub fn client_ip(req: &Request) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
