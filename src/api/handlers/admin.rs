use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::files::FileResponse;
use crate::entities::users;
use crate::models::Actor;
use crate::services::permissions::full_access;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// `ADMIN`, `USER` or `GUEST`
    pub role: String,
}

#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All registered users", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.gateway.admin().list_users(&actor).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 400, description = "Unknown role or own account"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .gateway
        .admin()
        .update_role(&actor, &user_id, &req.role)
        .await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}/files",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Files owned by the user, newest first", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn user_files(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let files = state.gateway.admin().user_files(&actor, &user_id).await?;
    Ok(Json(
        files
            .into_iter()
            .map(|file| FileResponse::new(file, full_access()))
            .collect(),
    ))
}
