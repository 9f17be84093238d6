//! Token Blacklist
//! Mission: Remember signed-out tokens so they can never be used again
//!
//! Process-local and unbounded; entries live until restart.

use parking_lot::RwLock;
use std::collections::HashSet;

/// Set of revoked raw token strings, shared by every request worker.
#[derive(Debug, Default)]
pub struct TokenBlacklist {
    revoked: RwLock<HashSet<String>>,
}

impl TokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke a token. Returns false if it was already revoked.
    pub fn revoke(&self, token: &str) -> bool {
        self.revoked.write().insert(token.to_string())
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        self.revoked.read().contains(token)
    }

    pub fn len(&self) -> usize {
        self.revoked.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.read().is_empty()
    }
}
