//! Authentication Module
//! Mission: Secure API access with JWT tokens, sign-out revocation and credential checks

pub mod api;
pub mod blacklist;
pub mod errors;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod session;

pub use api::auth_router;
pub use blacklist::TokenBlacklist;
pub use errors::AuthError;
pub use jwt::JwtHandler;
pub use middleware::{AuthenticationStage, CurrentUser};
pub use session::SessionIssuer;
