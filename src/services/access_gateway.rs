use crate::api::error::AppError;
use crate::config::AccessConfig;
use crate::entities::{prelude::*, *};
use crate::models::{Actor, Capability, CapabilitySet, Role};
use crate::services::admin_service::AdminService;
use crate::services::audit::{AuditEventType, AuditService};
use crate::services::permissions::{full_access, resolve_capabilities};
use crate::services::secure_link_service::{FileStream, SecureLinkService};
use crate::services::share_service::ShareService;
use crate::services::storage::StorageService;
use crate::utils::validation::{resolve_content_type, sanitize_filename};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// A file as seen by a particular actor.
pub struct VisibleFile {
    pub file: files::Model,
    pub capabilities: CapabilitySet,
}

/// Single entry point for every access decision and for serving file bytes.
pub struct AccessGateway {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    config: AccessConfig,
    shares: ShareService,
    links: SecureLinkService,
    admin: AdminService,
    audit: AuditService,
}

impl AccessGateway {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        config: AccessConfig,
    ) -> Self {
        Self {
            shares: ShareService::new(db.clone()),
            links: SecureLinkService::new(db.clone(), storage.clone(), config.clone()),
            admin: AdminService::new(db.clone()),
            audit: AuditService::new(db.clone()),
            db,
            storage,
            config,
        }
    }

    pub fn shares(&self) -> &ShareService {
        &self.shares
    }

    pub fn links(&self) -> &SecureLinkService {
        &self.links
    }

    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub async fn get_file(&self, file_id: &str) -> Result<files::Model, AppError> {
        Files::find_by_id(file_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))
    }

    pub async fn capabilities(
        &self,
        actor: &Actor,
        file: &files::Model,
    ) -> Result<CapabilitySet, AppError> {
        // Owners and admins never need the grant lookup.
        if actor.id == file.owner_id || actor.is_admin() {
            return Ok(full_access());
        }
        let grants = self.shares.grants_for(&file.id, &actor.id).await?;
        Ok(resolve_capabilities(actor, file, &grants, Utc::now()))
    }

    pub async fn authorize(
        &self,
        actor: &Actor,
        file: &files::Model,
        capability: Capability,
    ) -> Result<(), AppError> {
        let capabilities = self.capabilities(actor, file).await?;
        if capabilities.contains(&capability) {
            return Ok(());
        }

        self.audit.log(
            AuditEventType::AccessDenied,
            Some(&actor.id),
            Some(&file.id),
            capability.as_str(),
            "denied",
            None,
        );
        Err(AppError::Forbidden(format!(
            "{} permission required on this file",
            capability
        )))
    }

    pub async fn download(&self, actor: &Actor, file: &files::Model) -> Result<FileStream, AppError> {
        self.authorize(actor, file, Capability::Download).await?;

        let reader = self.storage.get_object_stream(&file.storage_key).await?;

        self.audit.log(
            AuditEventType::FileDownload,
            Some(&actor.id),
            Some(&file.id),
            "download",
            "success",
            None,
        );

        Ok(FileStream {
            reader,
            content_type: file.content_type.clone(),
            filename: file.original_name.clone(),
            size: file.size,
        })
    }

    pub async fn fetch_via_link(&self, link_id: &str) -> Result<FileStream, AppError> {
        self.links.consume(link_id).await
    }

    /// Files the actor owns or holds a live grant on, newest first. Admins see
    /// every file.
    pub async fn list_visible_files(&self, actor: &Actor) -> Result<Vec<VisibleFile>, AppError> {
        if actor.is_admin() {
            let all = Files::find()
                .order_by_desc(files::Column::CreatedAt)
                .all(&self.db)
                .await?;
            return Ok(all
                .into_iter()
                .map(|file| VisibleFile {
                    file,
                    capabilities: full_access(),
                })
                .collect());
        }

        let now = Utc::now();
        let grants: Vec<share_grants::Model> = self
            .shares
            .grants_received(&actor.id)
            .await?
            .into_iter()
            .filter(|g| !g.is_expired_at(now))
            .collect();
        let shared_ids: Vec<String> = grants.iter().map(|g| g.file_id.clone()).collect();

        let files = Files::find()
            .filter(
                Condition::any()
                    .add(files::Column::OwnerId.eq(&actor.id))
                    .add(files::Column::Id.is_in(shared_ids)),
            )
            .order_by_desc(files::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(files
            .into_iter()
            .map(|file| {
                let capabilities = resolve_capabilities(actor, &file, &grants, now);
                VisibleFile { file, capabilities }
            })
            .filter(|v| !v.capabilities.is_empty())
            .collect())
    }

    /// Stores the bytes and records `actor` as the owner of the new file.
    pub async fn upload(
        &self,
        actor: &Actor,
        filename: &str,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<files::Model, AppError> {
        if matches!(actor.role, Role::Guest) {
            return Err(AppError::Forbidden("Guests cannot upload files".to_string()));
        }
        if data.is_empty() {
            return Err(AppError::BadRequest("File is empty".to_string()));
        }
        if data.len() > self.config.max_upload_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File size cannot exceed {}MB",
                self.config.max_upload_size / 1024 / 1024
            )));
        }

        let filename =
            sanitize_filename(filename).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let content_type = resolve_content_type(content_type, &data, &self.config)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let storage_key = format!("uploads/{}/{}", actor.id, id);
        let size = data.len() as i64;

        self.storage.upload_file(&storage_key, data).await?;

        let file = files::ActiveModel {
            id: Set(id.clone()),
            owner_id: Set(actor.id.clone()),
            original_name: Set(filename),
            content_type: Set(content_type),
            size: Set(size),
            storage_key: Set(storage_key.clone()),
            created_at: Set(Utc::now()),
        };

        let file = match file.insert(&self.db).await {
            Ok(file) => file,
            Err(e) => {
                tracing::error!("Failed to insert file {}: {}", id, e);
                if let Err(cleanup) = self.storage.delete_file(&storage_key).await {
                    tracing::warn!("Orphaned blob {} left behind: {}", storage_key, cleanup);
                }
                return Err(e.into());
            }
        };

        self.audit.log(
            AuditEventType::FileUpload,
            Some(&actor.id),
            Some(&file.id),
            "upload",
            "success",
            Some(json!({ "size": file.size, "content_type": file.content_type })),
        );

        Ok(file)
    }

    /// Deletes the file with its grants and secure links. Owner or admin only.
    pub async fn delete_file(&self, actor: &Actor, file: &files::Model) -> Result<(), AppError> {
        self.authorize(actor, file, Capability::Manage).await?;

        let txn = self.db.begin().await?;
        SecureLinks::delete_many()
            .filter(secure_links::Column::FileId.eq(&file.id))
            .exec(&txn)
            .await?;
        ShareGrants::delete_many()
            .filter(share_grants::Column::FileId.eq(&file.id))
            .exec(&txn)
            .await?;
        Files::delete_by_id(&file.id).exec(&txn).await?;
        txn.commit().await?;

        if let Err(e) = self.storage.delete_file(&file.storage_key).await {
            tracing::error!("Failed to delete blob {}: {}", file.storage_key, e);
        }

        self.audit.log(
            AuditEventType::FileDelete,
            Some(&actor.id),
            Some(&file.id),
            "delete",
            "success",
            None,
        );

        Ok(())
    }
}
