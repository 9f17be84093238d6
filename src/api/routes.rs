use axum::{response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{auth_router, AuthenticationStage, JwtHandler, SessionIssuer, TokenBlacklist};
use crate::middleware::{
    ChainBuilder, CorsPolicy, CorsStage, IpRateLimiter, LoggingStage, RateLimitStage,
};
use crate::users::{users_router, UserRepository};

pub const AUTH_PREFIX: &str = "/api/v1/auth";
pub const USERS_PREFIX: &str = "/api/v1/users";

/// Long-lived services shared by every request.
///
/// Built once at startup and handed to [`create_router`]; dropping the last
/// router clone tears them down.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub jwt: Arc<JwtHandler>,
    pub blacklist: Arc<TokenBlacklist>,
    pub limiter: Arc<IpRateLimiter>,
    pub cors: Arc<CorsPolicy>,
}

/// Create the API router.
///
/// Public groups run logging, rate limiting and CORS; protected groups add
/// authentication after CORS so preflights never need a token.
pub fn create_router(state: &AppState) -> Router {
    let issuer = Arc::new(SessionIssuer::new(
        state.users.clone(),
        state.jwt.clone(),
        state.blacklist.clone(),
    ));

    let auth_chain = public_chain(state, "auth");
    let users_chain = public_chain(state, "users").stage(AuthenticationStage::new(
        state.jwt.clone(),
        state.blacklist.clone(),
        state.users.clone(),
    ));

    Router::new()
        .route("/health", get(health_check))
        .nest_service(AUTH_PREFIX, auth_chain.build(auth_router(issuer)))
        .nest_service(USERS_PREFIX, users_chain.build(users_router(state.users.clone())))
}

fn public_chain(state: &AppState, group: &'static str) -> ChainBuilder {
    ChainBuilder::new()
        .stage(LoggingStage::new(group))
        .stage(RateLimitStage::new(state.limiter.clone()))
        .stage(CorsStage::new(state.cors.clone()))
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
