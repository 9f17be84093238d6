//! Authentication Models
//! Mission: Define the wire format of sign-in and sign-out

use crate::auth::session::Session;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

/// Sign-in request body
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// Sign-in response: access token plus the (password-free) profile
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub token: String,
    pub expires_at: String, // ISO-8601 UTC, millisecond precision
    pub roles: Vec<String>,
}

impl From<Session> for SigninResponse {
    fn from(session: Session) -> Self {
        let roles = session.user.effective_roles();
        Self {
            id: session.user.id,
            name: session.user.name,
            email: session.user.email,
            token: session.token.token,
            expires_at: session
                .token
                .expires_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            roles,
        }
    }
}

/// Plain acknowledgement body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
