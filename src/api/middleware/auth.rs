use crate::api::error::AppError;
use crate::models::Actor;
use crate::utils::auth::validate_jwt;
use crate::{AppState, entities::prelude::Users};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// Resolves the bearer token (header or `?token=`) to an [`Actor`] and stores
/// it in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let token = auth_header.or_else(|| {
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<AuthQuery>(query)
            .ok()
            .and_then(|q| q.token)
    });

    let token = token.ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

    let claims = validate_jwt(&token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    // The user may have been removed since the token was issued
    let user = Users::find_by_id(claims.sub.clone())
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))?;

    let actor = Actor::try_from(user).map_err(|e| {
        tracing::warn!("User {} has an unusable role: {}", claims.sub, e);
        AppError::Unauthorized("Unknown role".to_string())
    })?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
