use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{Actor, SharePermission};
use crate::services::audit::{AuditEventType, AuditService};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::json;

/// Registry of per-recipient share grants.
#[derive(Clone)]
pub struct ShareService {
    db: DatabaseConnection,
    audit: AuditService,
}

impl ShareService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            db,
        }
    }

    /// Case-insensitive lookup of a registered user.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<users::Model>, AppError> {
        let user = Users::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(users::Column::Email)))
                    .eq(email.trim().to_lowercase()),
            )
            .one(&self.db)
            .await?;
        Ok(user)
    }

    /// Grants `recipient_email` access to `file`, or overwrites the existing
    /// grant for that pair. The write is a single upsert keyed on
    /// (file_id, recipient_id), so concurrent calls converge on one row.
    pub async fn create_or_update_share(
        &self,
        file: &files::Model,
        grantor: &Actor,
        recipient_email: &str,
        permission: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<share_grants::Model, AppError> {
        if grantor.id != file.owner_id {
            self.audit.log(
                AuditEventType::ShareGrant,
                Some(&grantor.id),
                Some(&file.id),
                "share",
                "not_owner",
                None,
            );
            return Err(AppError::NotOwner);
        }

        let recipient = self
            .find_user_by_email(recipient_email)
            .await?
            .ok_or_else(|| AppError::RecipientNotFound(recipient_email.trim().to_string()))?;

        if recipient.id == grantor.id || recipient.id == file.owner_id {
            return Err(AppError::SelfShare);
        }

        let permission: SharePermission =
            permission.parse().map_err(AppError::InvalidPermission)?;

        let now = Utc::now();
        let grant = share_grants::ActiveModel {
            file_id: Set(file.id.clone()),
            recipient_id: Set(recipient.id.clone()),
            granted_by: Set(grantor.id.clone()),
            permission: Set(permission.as_str().to_string()),
            expires_at: Set(expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        };

        ShareGrants::insert(grant)
            .on_conflict(
                OnConflict::columns([
                    share_grants::Column::FileId,
                    share_grants::Column::RecipientId,
                ])
                .update_columns([
                    share_grants::Column::GrantedBy,
                    share_grants::Column::Permission,
                    share_grants::Column::ExpiresAt,
                    share_grants::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        let stored = ShareGrants::find_by_id((file.id.clone(), recipient.id.clone()))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                AppError::StorageFailure(format!(
                    "share grant for file {} and recipient {} missing after upsert",
                    file.id, recipient.id
                ))
            })?;

        let outcome = if stored.created_at == stored.updated_at {
            "created"
        } else {
            "updated"
        };
        tracing::info!(
            "Share {} for file {} -> {} ({})",
            outcome,
            file.id,
            recipient.id,
            stored.permission
        );
        self.audit.log(
            AuditEventType::ShareGrant,
            Some(&grantor.id),
            Some(&file.id),
            "share",
            outcome,
            Some(json!({
                "recipient_id": recipient.id,
                "permission": stored.permission,
                "expires_at": stored.expires_at,
            })),
        );

        Ok(stored)
    }

    /// All grants on `file`, expired ones included. Owner only.
    pub async fn list_shares(
        &self,
        file: &files::Model,
        requester: &Actor,
    ) -> Result<Vec<share_grants::Model>, AppError> {
        if requester.id != file.owner_id {
            return Err(AppError::Forbidden(
                "Only the owner can list the shares of a file".to_string(),
            ));
        }

        let grants = ShareGrants::find()
            .filter(share_grants::Column::FileId.eq(&file.id))
            .order_by_asc(share_grants::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(grants)
    }

    /// Removes the grant of `recipient_id` on `file`. Revoking a grant that
    /// does not exist is not an error.
    pub async fn revoke_share(
        &self,
        file: &files::Model,
        requester: &Actor,
        recipient_id: &str,
    ) -> Result<(), AppError> {
        if requester.id != file.owner_id {
            return Err(AppError::Forbidden(
                "Only the owner can revoke shares".to_string(),
            ));
        }

        let res = ShareGrants::delete_many()
            .filter(share_grants::Column::FileId.eq(&file.id))
            .filter(share_grants::Column::RecipientId.eq(recipient_id))
            .exec(&self.db)
            .await?;

        if res.rows_affected > 0 {
            self.audit.log(
                AuditEventType::ShareRevoke,
                Some(&requester.id),
                Some(&file.id),
                "revoke",
                "success",
                Some(json!({ "recipient_id": recipient_id })),
            );
        }

        Ok(())
    }

    /// The grants addressed to `actor_id` on `file_id` (zero or one row).
    pub async fn grants_for(
        &self,
        file_id: &str,
        actor_id: &str,
    ) -> Result<Vec<share_grants::Model>, AppError> {
        let grants = ShareGrants::find()
            .filter(share_grants::Column::FileId.eq(file_id))
            .filter(share_grants::Column::RecipientId.eq(actor_id))
            .all(&self.db)
            .await?;
        Ok(grants)
    }

    /// Every grant addressed to `actor_id`, expired ones included.
    pub async fn grants_received(
        &self,
        actor_id: &str,
    ) -> Result<Vec<share_grants::Model>, AppError> {
        let grants = ShareGrants::find()
            .filter(share_grants::Column::RecipientId.eq(actor_id))
            .all(&self.db)
            .await?;
        Ok(grants)
    }
}
