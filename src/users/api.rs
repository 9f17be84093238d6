//! User API Endpoints
//! Mission: Serve user records to authenticated admins

use crate::api::ApiError;
use crate::auth::{models::MessageResponse, CurrentUser};
use crate::users::{
    models::{User, UserFilter},
    store::{StoreError, UserRepository},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Routes of the users group, relative to its mount point
pub fn users_router(users: Arc<dyn UserRepository>) -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(users)
}

/// List users - GET /?id=&name=&email=&offset=&limit=
pub async fn list_users(
    State(users): State<Arc<dyn UserRepository>>,
    CurrentUser(caller): CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<User>>, ApiError> {
    let filter = UserFilter::from_query(&params);
    debug!(caller = caller.id, filter = %filter, "Listing users");

    let found = users
        .find_many(&filter)
        .map_err(|e| storage_failure("list_users", e))?;

    Ok(Json(found))
}

/// Get one user - GET /:id
pub async fn get_user(
    State(users): State<Arc<dyn UserRepository>>,
    Path(raw_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = raw_id.parse::<i64>().map_err(|_| {
        warn!(component = "users::api", id = %raw_id, "Invalid user id");
        ApiError::BadRequest("Invalid User ID".to_string())
    })?;

    users
        .find_by_id(id)
        .map_err(|e| storage_failure("get_user", e))?
        .map(Json)
        .ok_or_else(|| {
            warn!(component = "users::api", id, "User not found");
            ApiError::NotFound("User not found".to_string())
        })
}

// Mutations are reserved; the routes exist so clients can be built against them.

pub async fn create_user() -> (StatusCode, Json<MessageResponse>) {
    (StatusCode::CREATED, Json(MessageResponse::new("User created")))
}

pub async fn update_user(Path(_id): Path<String>) -> Json<MessageResponse> {
    Json(MessageResponse::new("User updated"))
}

pub async fn delete_user(Path(_id): Path<String>) -> Json<MessageResponse> {
    Json(MessageResponse::new("User deleted"))
}

fn storage_failure(operation: &'static str, err: StoreError) -> ApiError {
    error!(component = "users::api", operation, error = %err, "Database error");
    ApiError::Internal("Server error".to_string())
}
