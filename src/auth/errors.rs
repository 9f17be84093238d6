//! Authentication failures and their HTTP mapping.

use crate::api::ApiError;
use crate::users::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Bearer Token not found")]
    MissingToken,
    #[error("Access Token Revoked")]
    RevokedToken,
    #[error("Invalid access token")]
    InvalidToken,
    #[error("Cannot extract access token")]
    ClaimExtractionFailed,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid Credentials")]
    InvalidCredentials,
    #[error("Failed to generate access token")]
    TokenIssue,
    #[error("Failed to verify credentials")]
    PasswordCheck(#[from] bcrypt::BcryptError),
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::MissingToken
            | AuthError::RevokedToken
            | AuthError::InvalidToken
            | AuthError::ClaimExtractionFailed
            | AuthError::InvalidCredentials => ApiError::Unauthorized(message),
            AuthError::UserNotFound => ApiError::NotFound(message),
            AuthError::TokenIssue => ApiError::Internal(message),
            AuthError::PasswordCheck(_) | AuthError::Storage(_) => {
                ApiError::Internal("Server error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_auth_error_statuses() {
        let unauthorized = [
            AuthError::MissingToken,
            AuthError::RevokedToken,
            AuthError::InvalidToken,
            AuthError::ClaimExtractionFailed,
            AuthError::InvalidCredentials,
        ];
        for err in unauthorized {
            assert_eq!(ApiError::from(err).status(), StatusCode::UNAUTHORIZED);
        }

        assert_eq!(
            ApiError::from(AuthError::UserNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AuthError::TokenIssue).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_details_not_leaked() {
        let err = AuthError::Storage(StoreError::Database(
            rusqlite::Error::InvalidQuery,
        ));
        let api: ApiError = err.into();
        assert_eq!(api.to_string(), "Server error");
    }
}
