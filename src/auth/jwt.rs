//! JWT Token Handler
//! Mission: Mint and verify the signed bearer tokens handed out at sign-in

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Verified claims of a session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: i64, // subject (user id)
    pub exp: i64, // expiration timestamp (unix seconds)
}

/// A freshly minted token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, wrong algorithm, malformed structure or expired
    #[error("token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    /// Signature checks out but the subject is missing or not a user id
    #[error("subject claim missing or malformed")]
    MissingSubject,
}

#[derive(Serialize)]
struct SignedClaims {
    sub: String,
    exp: i64,
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<Value>,
    exp: i64,
}

/// JWT Handler for token operations (HS256, shared secret)
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key and 24-hour tokens
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::hours(24))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact; a token is dead the second its exp passes
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a token for a user, valid for the configured TTL
    pub fn generate_token(&self, user_id: i64) -> Result<IssuedToken, TokenError> {
        self.generate_token_expiring_at(user_id, Utc::now() + self.ttl)
    }

    /// Generate a token with an explicit expiry instant
    pub fn generate_token_expiring_at(
        &self,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let claims = SignedClaims {
            sub: user_id.to_string(),
            exp: expires_at.timestamp(),
        };

        debug!(user_id, expires_at = %expires_at, "Generating JWT");

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate a token and extract claims.
    ///
    /// Signature, algorithm and expiry are checked before the subject is looked at.
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        let decoded = decode::<RawClaims>(token, &self.decoding_key, &self.validation)?;
        let raw = decoded.claims;

        let sub = match raw.sub {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse::<i64>().ok(),
            _ => None,
        }
        .ok_or(TokenError::MissingSubject)?;

        Ok(Claims { sub, exp: raw.exp })
    }
}
