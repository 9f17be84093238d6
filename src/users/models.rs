//! User Models
//! Mission: Describe the user records the admin backend serves and filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Role granted to accounts that carry no explicit roles
pub const DEFAULT_ROLE: &str = "superadmin";

/// User account, read-only to the request pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String, // bcrypt hash - never serialize
    #[serde(serialize_with = "serialize_effective_roles")]
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Roles as presented to clients; accounts without stored roles are superadmins.
    pub fn effective_roles(&self) -> Vec<String> {
        effective_roles(&self.roles)
    }
}

fn effective_roles(stored: &[String]) -> Vec<String> {
    if stored.is_empty() {
        vec![DEFAULT_ROLE.to_string()]
    } else {
        stored.to_vec()
    }
}

fn serialize_effective_roles<S: Serializer>(
    roles: &[String],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(effective_roles(roles))
}

/// Fields required to insert a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String, // plaintext, hashed by the store
    pub roles: Vec<String>,
}

/// Filter for listing users.
///
/// Zero / empty fields mean "no constraint". `limit` and `offset` only apply
/// when greater than zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub offset: i64,
    pub limit: i64,
}

impl UserFilter {
    /// Build a filter from raw query parameters.
    ///
    /// Numbers that fail to parse (or are negative) fall back to 0 instead of
    /// rejecting the request.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let number = |key: &str| {
            params
                .get(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(0)
        };
        let text = |key: &str| params.get(key).cloned().unwrap_or_default();

        Self {
            id: number("id"),
            name: text("name"),
            email: text("email"),
            offset: number("offset"),
            limit: number("limit"),
        }
    }
}

impl fmt::Display for UserFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ id: {}, name: {}, email: {}, offset: {}, limit: {} }}",
            self.id, self.name, self.email, self.offset, self.limit
        )
    }
}
