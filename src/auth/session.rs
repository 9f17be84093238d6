//! Session Issuer
//! Mission: Exchange credentials for bearer tokens and revoke them on sign-out

use crate::auth::{
    blacklist::TokenBlacklist,
    errors::AuthError,
    jwt::{IssuedToken, JwtHandler},
    middleware::bearer_token,
};
use crate::users::{models::User, store::UserRepository};
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a successful sign-in
#[derive(Debug, Clone)]
pub struct Session {
    pub token: IssuedToken,
    pub user: User,
}

pub struct SessionIssuer {
    users: Arc<dyn UserRepository>,
    jwt: Arc<JwtHandler>,
    blacklist: Arc<TokenBlacklist>,
}

impl SessionIssuer {
    pub fn new(
        users: Arc<dyn UserRepository>,
        jwt: Arc<JwtHandler>,
        blacklist: Arc<TokenBlacklist>,
    ) -> Self {
        Self {
            users,
            jwt,
            blacklist,
        }
    }

    /// Verify credentials and mint a token for the account.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        info!("🔐 Sign-in attempt: {}", email);

        let user = self
            .users
            .find_by_email(email)?
            .ok_or(AuthError::UserNotFound)?;

        if !bcrypt::verify(password, &user.password)? {
            warn!("❌ Failed sign-in attempt: {}", email);
            return Err(AuthError::InvalidCredentials);
        }

        let token = self
            .jwt
            .generate_token(user.id)
            .map_err(|_| AuthError::TokenIssue)?;

        info!("✅ Sign-in successful: {} ({})", user.email, user.id);

        Ok(Session { token, user })
    }

    /// Revoke the bearer token carried by `headers`.
    ///
    /// The token is not verified: anything presented with the Bearer scheme,
    /// an empty string included, is blacklisted as-is.
    pub fn sign_out(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;

        self.blacklist.revoke(token);
        info!(revoked = self.blacklist.len(), "👋 Token revoked on sign-out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::middleware::AuthenticationStage;
    use crate::users::models::NewUser;
    use crate::users::store::SqliteUserStore;
    use axum::http::header;

    struct Fixture {
        issuer: SessionIssuer,
        stage: AuthenticationStage,
        blacklist: Arc<TokenBlacklist>,
    }

    fn fixture() -> Fixture {
        let store = SqliteUserStore::open_in_memory().unwrap().with_hash_cost(4);
        store
            .create_user(&NewUser {
                name: "A B".to_string(),
                email: "a@b.com".to_string(),
                password: "x".to_string(),
                roles: vec![],
            })
            .unwrap();

        let users: Arc<dyn UserRepository> = Arc::new(store);
        let jwt = Arc::new(JwtHandler::new("test-secret-key-12345"));
        let blacklist = Arc::new(TokenBlacklist::new());

        Fixture {
            issuer: SessionIssuer::new(users.clone(), jwt.clone(), blacklist.clone()),
            stage: AuthenticationStage::new(jwt, blacklist.clone(), users),
            blacklist,
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_sign_in_round_trip() {
        let f = fixture();
        let session = f.issuer.sign_in("a@b.com", "x").unwrap();
        assert_eq!(session.user.id, 1);
        assert!(!session.token.token.is_empty());

        let user = f.stage.authenticate(&bearer(&session.token.token)).unwrap();
        assert_eq!(user.id, session.user.id);
    }

    #[test]
    fn test_sign_in_failures() {
        let f = fixture();
        assert!(matches!(
            f.issuer.sign_in("missing@b.com", "x"),
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            f.issuer.sign_in("a@b.com", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_sign_out_revokes_token() {
        let f = fixture();
        let session = f.issuer.sign_in("a@b.com", "x").unwrap();
        let headers = bearer(&session.token.token);

        f.issuer.sign_out(&headers).unwrap();
        assert!(f.blacklist.is_revoked(&session.token.token));
        assert!(matches!(
            f.stage.authenticate(&headers),
            Err(AuthError::RevokedToken)
        ));
    }

    #[test]
    fn test_sign_out_accepts_unverified_tokens() {
        let f = fixture();
        f.issuer.sign_out(&bearer("garbage")).unwrap();
        assert!(f.blacklist.is_revoked("garbage"));
    }

    #[test]
    fn test_sign_out_requires_bearer() {
        let f = fixture();
        assert!(matches!(
            f.issuer.sign_out(&HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(matches!(
            f.issuer.sign_out(&basic),
            Err(AuthError::MissingToken)
        ));
        assert!(f.blacklist.is_empty());
    }

    #[test]
    fn test_sign_out_revokes_empty_token() {
        let f = fixture();
        f.issuer.sign_out(&bearer("")).unwrap();
        assert!(f.blacklist.is_revoked(""));

        // Empty tokens hit the blacklist check before the emptiness check
        assert!(matches!(
            f.stage.authenticate(&bearer("")),
            Err(AuthError::RevokedToken)
        ));
    }
}
