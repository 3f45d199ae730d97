use crate::api::error::AppError;
use crate::config::AccessConfig;
use crate::entities::{prelude::*, *};
use crate::models::Actor;
use crate::services::audit::{AuditEventType, AuditService};
use crate::services::storage::{BlobReader, StorageService};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct IssuedLink {
    pub id: String,
    pub expires_at: DateTime<Utc>,
}

/// An opened file together with what the HTTP layer needs for its headers.
pub struct FileStream {
    pub reader: BlobReader,
    pub content_type: String,
    pub filename: String,
    pub size: i64,
}

#[derive(Clone)]
pub struct SecureLinkService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    config: AccessConfig,
    audit: AuditService,
}

impl SecureLinkService {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        config: AccessConfig,
    ) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            db,
            storage,
            config,
        }
    }

    /// Generate an unguessable URL-safe token from the OS RNG
    pub fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub async fn issue(
        &self,
        file: &files::Model,
        requester: &Actor,
        ttl_minutes: Option<i64>,
    ) -> Result<IssuedLink, AppError> {
        if requester.id != file.owner_id {
            self.audit.log(
                AuditEventType::LinkIssue,
                Some(&requester.id),
                Some(&file.id),
                "issue",
                "not_owner",
                None,
            );
            return Err(AppError::NotOwner);
        }

        let ttl = ttl_minutes.unwrap_or(self.config.secure_link_ttl_minutes);
        if ttl <= 0 || ttl > self.config.max_secure_link_ttl_minutes {
            return Err(AppError::BadRequest(format!(
                "ttl_minutes must be between 1 and {}",
                self.config.max_secure_link_ttl_minutes
            )));
        }

        let now = Utc::now();
        let expires_at = now + Duration::minutes(ttl);
        let link = secure_links::ActiveModel {
            id: Set(Self::generate_token()),
            file_id: Set(file.id.clone()),
            created_by: Set(requester.id.clone()),
            created_at: Set(now),
            expires_at: Set(expires_at),
            is_used: Set(false),
            used_at: Set(None),
        };
        let link = link.insert(&self.db).await?;

        tracing::info!(
            "🔗 Secure link issued for file {} (expires {})",
            file.id,
            expires_at
        );
        self.audit.log(
            AuditEventType::LinkIssue,
            Some(&requester.id),
            Some(&file.id),
            "issue",
            "success",
            Some(json!({ "ttl_minutes": ttl })),
        );

        Ok(IssuedLink {
            id: link.id,
            expires_at: link.expires_at,
        })
    }

    /// Spends the link and opens the file it points to.
    ///
    /// The `is_used` flip is a conditional update inside a transaction that
    /// is only committed once the blob has been opened, so at most one caller
    /// ever succeeds and a storage failure leaves the link unused.
    ///
    /// Concurrent callers that reach the update while the winner's
    /// transaction is open block on its row lock (sqlite: the database write
    /// lock) until it commits or rolls back, then re-evaluate the filter. The
    /// winner holds that lock while the blob is opened, so a slow store
    /// delays the losers by the same amount.
    pub async fn consume(&self, link_id: &str) -> Result<FileStream, AppError> {
        let now = Utc::now();

        let link = SecureLinks::find_by_id(link_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Secure link not found".to_string()))?;

        if link.is_expired_at(now) {
            self.log_rejection(&link, "expired");
            return Err(AppError::Expired);
        }
        if link.is_used {
            self.log_rejection(&link, "already_used");
            return Err(AppError::AlreadyUsed);
        }

        let file = Files::find_by_id(&link.file_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Linked file no longer exists".to_string()))?;

        let txn = self.db.begin().await?;
        let res = SecureLinks::update_many()
            .col_expr(secure_links::Column::IsUsed, Expr::value(true))
            .col_expr(secure_links::Column::UsedAt, Expr::value(Some(now)))
            .filter(secure_links::Column::Id.eq(link_id))
            .filter(secure_links::Column::IsUsed.eq(false))
            .filter(secure_links::Column::ExpiresAt.gte(now))
            .exec(&txn)
            .await?;

        if res.rows_affected != 1 {
            txn.rollback().await?;
            // Lost the race: report what the winner left behind.
            let current = SecureLinks::find_by_id(link_id).one(&self.db).await?;
            return Err(match current {
                None => AppError::NotFound("Secure link not found".to_string()),
                Some(l) if l.is_used => {
                    self.log_rejection(&l, "already_used");
                    AppError::AlreadyUsed
                }
                Some(l) => {
                    self.log_rejection(&l, "expired");
                    AppError::Expired
                }
            });
        }

        let reader = match self.storage.get_object_stream(&file.storage_key).await {
            Ok(reader) => reader,
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Rollback after storage failure failed: {}", rollback_err);
                }
                tracing::error!("Failed to open blob for link on file {}: {:#}", file.id, e);
                return Err(AppError::StorageFailure(format!(
                    "could not open file {}: {}",
                    file.id, e
                )));
            }
        };

        txn.commit().await?;

        self.audit.log(
            AuditEventType::LinkConsume,
            None,
            Some(&file.id),
            "consume",
            "success",
            None,
        );

        Ok(FileStream {
            reader,
            content_type: file.content_type,
            filename: file.original_name,
            size: file.size,
        })
    }

    pub async fn sweep(&self) -> Result<u64, AppError> {
        self.sweep_at(Utc::now()).await
    }

    /// Deletes links whose expiry is older than the retention window,
    /// used or not. Only terminal rows match, so this never races with
    /// `issue` or `consume`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let cutoff = now - Duration::hours(self.config.secure_link_retention_hours);
        let res = SecureLinks::delete_many()
            .filter(secure_links::Column::ExpiresAt.lt(cutoff))
            .exec(&self.db)
            .await?;

        if res.rows_affected > 0 {
            tracing::info!("🧹 Swept {} stale secure links", res.rows_affected);
            self.audit.log(
                AuditEventType::LinkSweep,
                None,
                None,
                "sweep",
                "success",
                Some(json!({ "deleted": res.rows_affected })),
            );
        }

        Ok(res.rows_affected)
    }

    fn log_rejection(&self, link: &secure_links::Model, reason: &str) {
        tracing::warn!("Secure link for file {} rejected: {}", link.file_id, reason);
        self.audit.log(
            AuditEventType::LinkConsume,
            None,
            Some(&link.file_id),
            "consume",
            reason,
            None,
        );
    }
}
