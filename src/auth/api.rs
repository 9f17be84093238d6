//! Authentication API Endpoints
//! Mission: Provide sign-in and sign-out endpoints

use crate::api::ApiError;
use crate::auth::{
    errors::AuthError,
    models::{MessageResponse, SigninRequest, SigninResponse},
    session::SessionIssuer,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use tracing::{error, warn};

/// Routes of the auth group, relative to its mount point
pub fn auth_router(issuer: Arc<SessionIssuer>) -> Router {
    Router::new()
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .with_state(issuer)
}

/// Sign-in endpoint - POST /signin
pub async fn signin(
    State(issuer): State<Arc<SessionIssuer>>,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> Result<Json<SigninResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(component = "auth::api", error = %rejection, "Invalid sign-in body");
        ApiError::BadRequest("Invalid JSON body".to_string())
    })?;

    let session = issuer
        .sign_in(&payload.email, &payload.password)
        .map_err(|e| reject("signin", e))?;

    Ok(Json(SigninResponse::from(session)))
}

/// Sign-out endpoint - POST /signout
pub async fn signout(
    State(issuer): State<Arc<SessionIssuer>>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    issuer.sign_out(&headers).map_err(|e| reject("signout", e))?;
    Ok(Json(MessageResponse::new("User Signed Out")))
}

fn reject(operation: &'static str, err: AuthError) -> ApiError {
    match &err {
        AuthError::Storage(_) | AuthError::PasswordCheck(_) | AuthError::TokenIssue => {
            error!(component = "auth::api", operation, error = %err, "Auth operation failed")
        }
        _ => warn!(component = "auth::api", operation, reason = %err, "Auth request rejected"),
    }
    err.into()
}
