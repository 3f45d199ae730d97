use crate::AppState;
use crate::api::error::AppError;
use crate::entities::share_grants;
use crate::models::Actor;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateShareRequest {
    #[validate(email(message = "recipient_email must be an email address"))]
    pub recipient_email: String,
    /// `VIEW` or `DOWNLOAD`
    pub permission: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct ShareResponse {
    pub file_id: String,
    pub recipient_id: String,
    pub granted_by: String,
    pub permission: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<share_grants::Model> for ShareResponse {
    fn from(grant: share_grants::Model) -> Self {
        Self {
            is_expired: grant.is_expired_at(Utc::now()),
            file_id: grant.file_id,
            recipient_id: grant.recipient_id,
            granted_by: grant.granted_by,
            permission: grant.permission,
            expires_at: grant.expires_at,
            created_at: grant.created_at,
            updated_at: grant.updated_at,
        }
    }
}

/// Share a file with a registered user, or change an existing share
#[utoipa::path(
    post,
    path = "/files/{id}/shares",
    params(("id" = String, Path, description = "File ID")),
    request_body = CreateShareRequest,
    responses(
        (status = 200, description = "Share created or updated", body = ShareResponse),
        (status = 400, description = "Unknown recipient, self-share or invalid permission"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the owner can share"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "shares"
)]
pub async fn create_share(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(file_id): Path<String>,
    Json(req): Json<CreateShareRequest>,
) -> Result<Json<ShareResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let file = state.gateway.get_file(&file_id).await?;
    let grant = state
        .gateway
        .shares()
        .create_or_update_share(
            &file,
            &actor,
            &req.recipient_email,
            &req.permission,
            req.expires_at,
        )
        .await?;

    Ok(Json(grant.into()))
}

#[utoipa::path(
    get,
    path = "/files/{id}/shares",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "All shares of the file, expired ones included", body = Vec<ShareResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the owner can list shares"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "shares"
)]
pub async fn list_shares(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(file_id): Path<String>,
) -> Result<Json<Vec<ShareResponse>>, AppError> {
    let file = state.gateway.get_file(&file_id).await?;
    let grants = state.gateway.shares().list_shares(&file, &actor).await?;
    Ok(Json(grants.into_iter().map(ShareResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/files/{id}/shares/{recipient_id}",
    params(
        ("id" = String, Path, description = "File ID"),
        ("recipient_id" = String, Path, description = "Recipient user ID")
    ),
    responses(
        (status = 204, description = "Share revoked (or never existed)"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the owner can revoke shares"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "shares"
)]
pub async fn revoke_share(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((file_id, recipient_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let file = state.gateway.get_file(&file_id).await?;
    state
        .gateway
        .shares()
        .revoke_share(&file, &actor, &recipient_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
