//! User records: model, SQLite persistence and the read-only HTTP surface.

pub mod api;
pub mod models;
pub mod store;

pub use api::users_router;
pub use models::{NewUser, User, UserFilter};
pub use store::{SqliteUserStore, StoreError, UserRepository};
