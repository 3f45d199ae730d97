pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AccessConfig;
use crate::services::access_gateway::AccessGateway;
use crate::services::storage::StorageService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::files::upload_file,
        api::handlers::files::list_files,
        api::handlers::files::download_file,
        api::handlers::files::delete_file,
        api::handlers::shares::create_share,
        api::handlers::shares::list_shares,
        api::handlers::shares::revoke_share,
        api::handlers::secure_links::create_secure_link,
        api::handlers::secure_links::consume_secure_link,
        api::handlers::admin::list_users,
        api::handlers::admin::update_user_role,
        api::handlers::admin::user_files,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::files::FileResponse,
            api::handlers::shares::CreateShareRequest,
            api::handlers::shares::ShareResponse,
            api::handlers::secure_links::CreateSecureLinkRequest,
            api::handlers::secure_links::SecureLinkResponse,
            api::handlers::admin::UserResponse,
            api::handlers::admin::UpdateRoleRequest,
            models::Capability,
            models::SharePermission,
            models::Role,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "system", description = "Health endpoints"),
        (name = "files", description = "File upload, listing, download and deletion"),
        (name = "shares", description = "Per-user share grants"),
        (name = "secure-links", description = "Single-use anonymous download links"),
        (name = "admin", description = "User administration")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub gateway: Arc<AccessGateway>,
    pub config: AccessConfig,
}

impl AppState {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: AccessConfig) -> Self {
        let gateway = Arc::new(AccessGateway::new(
            db.clone(),
            storage.clone(),
            config.clone(),
        ));
        Self {
            db,
            storage,
            gateway,
            config,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/files",
            get(api::handlers::files::list_files).post(api::handlers::files::upload_file),
        )
        .route("/files/:id", delete(api::handlers::files::delete_file))
        .route(
            "/files/:id/download",
            get(api::handlers::files::download_file),
        )
        .route(
            "/files/:id/shares",
            get(api::handlers::shares::list_shares).post(api::handlers::shares::create_share),
        )
        .route(
            "/files/:id/shares/:recipient_id",
            delete(api::handlers::shares::revoke_share),
        )
        .route(
            "/files/:id/secure-links",
            post(api::handlers::secure_links::create_secure_link),
        )
        .route("/admin/users", get(api::handlers::admin::list_users))
        .route("/admin/users/:id", put(api::handlers::admin::update_user_role))
        .route("/admin/users/:id/files", get(api::handlers::admin::user_files))
        .route_layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/secure-links/:id",
            get(api::handlers::secure_links::consume_secure_link),
        )
        .merge(protected)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config.allowed_origins))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_upload_size + 1024 * 1024, // multipart overhead
        ))
        .with_state(state)
}
