use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub original_name: String,
    pub content_type: String,
    pub size: i64,
    pub storage_key: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(has_many = "super::share_grants::Entity")]
    ShareGrants,
    #[sea_orm(has_many = "super::secure_links::Entity")]
    SecureLinks,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::share_grants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShareGrants.def()
    }
}

impl Related<super::secure_links::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SecureLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
