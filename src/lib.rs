//! Admin Backend Library
//!
//! Authentication, session revocation and user records behind a small
//! HTTP API. The binary in `main.rs` only wires configuration, storage and
//! the listener around [`api::create_router`].

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;
pub mod shutdown;
pub mod users;
