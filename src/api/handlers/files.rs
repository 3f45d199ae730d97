use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::file_response;
use crate::entities::files;
use crate::models::{Actor, Capability, CapabilitySet};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct FileResponse {
    pub id: String,
    pub owner_id: String,
    pub original_name: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    /// What the caller may do with this file
    pub capabilities: Vec<Capability>,
}

impl FileResponse {
    pub(crate) fn new(file: files::Model, capabilities: CapabilitySet) -> Self {
        Self {
            id: file.id,
            owner_id: file.owner_id,
            original_name: file.original_name,
            content_type: file.content_type,
            size: file.size,
            created_at: file.created_at,
            capabilities: capabilities.into_iter().collect(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/files",
    request_body(content = Multipart, description = "File upload (field `file`)"),
    responses(
        (status = 201, description = "File uploaded", body = FileResponse),
        (status = 400, description = "Empty file, bad name or unsupported type"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Guests cannot upload"),
        (status = 413, description = "File too large")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), AppError> {
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        let err_msg = e.to_string();
        if err_msg.contains("length limit exceeded") {
            AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
        } else {
            AppError::BadRequest(err_msg)
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await.map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("length limit exceeded") {
                AppError::PayloadTooLarge(
                    "Request body exceeds the maximum allowed limit".to_string(),
                )
            } else {
                AppError::BadRequest(err_msg)
            }
        })?;
        upload = Some((filename, content_type, data.to_vec()));
    }

    let (filename, content_type, data) =
        upload.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let file = state
        .gateway
        .upload(&actor, &filename, content_type.as_deref(), data)
        .await?;

    tracing::info!("📤 {} uploaded {} ({} bytes)", actor.id, file.id, file.size);

    let capabilities = state.gateway.capabilities(&actor, &file).await?;
    Ok((StatusCode::CREATED, Json(FileResponse::new(file, capabilities))))
}

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "Files visible to the caller, newest first", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let files = state.gateway.list_visible_files(&actor).await?;
    Ok(Json(
        files
            .into_iter()
            .map(|v| FileResponse::new(v.file, v.capabilities))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/files/{id}/download",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "File content stream"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "DOWNLOAD permission required"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let file = state.gateway.get_file(&file_id).await?;
    let stream = state.gateway.download(&actor, &file).await?;
    Ok(file_response(stream))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 204, description = "File, shares and secure links deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the owner or an admin can delete"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let file = state.gateway.get_file(&file_id).await?;
    state.gateway.delete_file(&actor, &file).await?;
    Ok(StatusCode::NO_CONTENT)
}
