pub mod error;
pub mod routes;

pub use error::{ApiError, ErrorBody};
pub use routes::{create_router, AppState, AUTH_PREFIX, USERS_PREFIX};
