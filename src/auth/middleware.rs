//! Authentication Middleware
//! Mission: Protect API endpoints with JWT validation and sign-out revocation

use crate::api::ApiError;
use crate::auth::{
    blacklist::TokenBlacklist,
    errors::AuthError,
    jwt::{JwtHandler, TokenError},
};
use crate::middleware::chain::{Next, Stage};
use crate::users::{models::User, store::UserRepository};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, warn};

const BEARER_PREFIX: &str = "Bearer ";

/// The raw token after the `Bearer ` prefix, or None when the header is
/// absent, not UTF-8, or uses another scheme.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix(BEARER_PREFIX))
}

/// Caller identity attached to the request by [`AuthenticationStage`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized(AuthError::MissingToken.to_string()))
    }
}

/// Validates bearer tokens and resolves the caller before any handler runs.
pub struct AuthenticationStage {
    jwt: Arc<JwtHandler>,
    blacklist: Arc<TokenBlacklist>,
    users: Arc<dyn UserRepository>,
}

impl AuthenticationStage {
    pub fn new(
        jwt: Arc<JwtHandler>,
        blacklist: Arc<TokenBlacklist>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            jwt,
            blacklist,
            users,
        }
    }

    /// Resolve the caller behind the Authorization header.
    ///
    /// Revocation is checked before the token is even parsed, so a signed-out
    /// token fails the same way whether or not it is still cryptographically valid.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;

        if self.blacklist.is_revoked(token) {
            return Err(AuthError::RevokedToken);
        }

        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = self.jwt.validate_token(token).map_err(|e| match e {
            TokenError::Invalid(cause) => {
                debug!(error = %cause, "Token verification failed");
                AuthError::InvalidToken
            }
            TokenError::MissingSubject => AuthError::ClaimExtractionFailed,
        })?;

        self.users
            .find_by_id(claims.sub)?
            .ok_or(AuthError::UserNotFound)
    }
}

#[async_trait]
impl Stage for AuthenticationStage {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn process(&self, mut req: Request, next: Next<'_>) -> Response {
        match self.authenticate(req.headers()) {
            Ok(user) => {
                debug!(user_id = user.id, "Request authenticated");
                req.extensions_mut().insert(CurrentUser(user));
                next.run(req).await
            }
            Err(err) => {
                match &err {
                    AuthError::Storage(cause) => error!(
                        component = "auth::middleware",
                        error = %cause,
                        "User lookup failed"
                    ),
                    other => warn!(
                        component = "auth::middleware",
                        reason = %other,
                        "Authentication rejected"
                    ),
                }
                ApiError::from(err).into_response()
            }
        }
    }
}
