use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::file_response;
use crate::models::Actor;
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema, Default)]
pub struct CreateSecureLinkRequest {
    /// Lifetime in minutes; the configured default applies when omitted
    pub ttl_minutes: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct SecureLinkResponse {
    pub id: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// An empty body means "use the defaults". Anything else must be a JSON
/// document that deserializes cleanly.
fn parse_link_request(
    headers: &HeaderMap,
    body: &[u8],
) -> Result<CreateSecureLinkRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateSecureLinkRequest::default());
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .is_some_and(|m| {
            m.type_() == mime::APPLICATION
                && (m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
        });
    if !is_json {
        return Err(AppError::BadRequest(
            "Request body must be sent as application/json".to_string(),
        ));
    }

    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
}

#[utoipa::path(
    post,
    path = "/files/{id}/secure-links",
    params(("id" = String, Path, description = "File ID")),
    request_body(content = CreateSecureLinkRequest, description = "Optional; an empty body uses the default lifetime", content_type = "application/json"),
    responses(
        (status = 201, description = "Single-use link issued", body = SecureLinkResponse),
        (status = 400, description = "Malformed body or ttl_minutes out of range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the owner can issue links"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "secure-links"
)]
pub async fn create_secure_link(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<SecureLinkResponse>), AppError> {
    let req = parse_link_request(&headers, &body)?;

    let file = state.gateway.get_file(&file_id).await?;
    let link = state
        .gateway
        .links()
        .issue(&file, &actor, req.ttl_minutes)
        .await?;

    let url = format!(
        "{}/secure-links/{}",
        state.config.public_base_url.trim_end_matches('/'),
        link.id
    );

    Ok((
        StatusCode::CREATED,
        Json(SecureLinkResponse {
            id: link.id,
            url,
            expires_at: link.expires_at,
        }),
    ))
}

/// Public, unauthenticated download through a single-use link
#[utoipa::path(
    get,
    path = "/secure-links/{id}",
    params(("id" = String, Path, description = "Secure link token")),
    responses(
        (status = 200, description = "File content stream"),
        (status = 404, description = "No such link"),
        (status = 410, description = "Link expired or already used")
    ),
    tag = "secure-links"
)]
pub async fn consume_secure_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> Result<Response, AppError> {
    let stream = state.gateway.fetch_via_link(&link_id).await?;
    Ok(file_response(stream))
}
