use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{Actor, Role};
use crate::services::audit::{AuditEventType, AuditService};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::json;

/// User administration. Every operation requires an admin actor.
#[derive(Clone)]
pub struct AdminService {
    db: DatabaseConnection,
    audit: AuditService,
}

impl AdminService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            db,
        }
    }

    fn require_admin(&self, actor: &Actor, action: &str) -> Result<(), AppError> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::User | Role::Guest => {
                self.audit.log(
                    AuditEventType::AccessDenied,
                    Some(&actor.id),
                    None,
                    action,
                    "denied",
                    None,
                );
                Err(AppError::Forbidden("Admin role required".to_string()))
            }
        }
    }

    async fn find_user(&self, user_id: &str) -> Result<users::Model, AppError> {
        Users::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn list_users(&self, actor: &Actor) -> Result<Vec<users::Model>, AppError> {
        self.require_admin(actor, "list_users")?;
        let users = Users::find()
            .order_by_asc(users::Column::Email)
            .all(&self.db)
            .await?;
        Ok(users)
    }

    /// Changes the role of `user_id`. Admins cannot change their own role.
    pub async fn update_role(
        &self,
        actor: &Actor,
        user_id: &str,
        role: &str,
    ) -> Result<users::Model, AppError> {
        self.require_admin(actor, "update_role")?;
        let role: Role = role.parse().map_err(AppError::BadRequest)?;
        if user_id == actor.id {
            return Err(AppError::BadRequest(
                "Admins cannot change their own role".to_string(),
            ));
        }

        let user = self.find_user(user_id).await?;
        let previous = user.role.clone();
        let mut active: users::ActiveModel = user.into();
        active.role = Set(role.as_str().to_string());
        let user = active.update(&self.db).await?;

        tracing::info!("👤 Role of {} changed {} -> {}", user.id, previous, user.role);
        self.audit.log(
            AuditEventType::RoleChange,
            Some(&actor.id),
            Some(&user.id),
            "update_role",
            "success",
            Some(json!({ "from": previous, "to": user.role })),
        );

        Ok(user)
    }

    /// Files owned by `user_id`, newest first.
    pub async fn user_files(
        &self,
        actor: &Actor,
        user_id: &str,
    ) -> Result<Vec<files::Model>, AppError> {
        self.require_admin(actor, "user_files")?;
        let user = self.find_user(user_id).await?;
        let files = Files::find()
            .filter(files::Column::OwnerId.eq(&user.id))
            .order_by_desc(files::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(files)
    }
}
