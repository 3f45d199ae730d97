use crate::entities::{prelude::*, users};
use crate::models::Role;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::env;
use tracing::info;
use uuid::Uuid;

/// Returns the user registered under `email`, inserting it with `role` if absent.
/// An existing user keeps its current role.
pub async fn ensure_user(
    db: &DatabaseConnection,
    email: &str,
    role: Role,
) -> anyhow::Result<users::Model> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        anyhow::bail!("email cannot be empty");
    }

    if let Some(existing) = Users::find()
        .filter(users::Column::Email.eq(&email))
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set(email.clone()),
        role: Set(role.as_str().to_string()),
        created_at: Set(Some(Utc::now())),
    }
    .insert(db)
    .await?;

    info!("🌱 Registered {} as {}", email, role);
    Ok(user)
}

/// Seeds the bootstrap administrator named by `ADMIN_EMAIL`, when set.
pub async fn seed_initial_data(db: &DatabaseConnection) -> anyhow::Result<()> {
    if let Ok(email) = env::var("ADMIN_EMAIL") {
        ensure_user(db, &email, Role::Admin).await?;
    }
    Ok(())
}
