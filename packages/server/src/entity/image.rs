use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Metadata for one uploaded image. The bytes live in the blob store under
/// `storage_key`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    /// User-supplied filename. Display only.
    pub original_name: String,

    /// Server-generated blob name. Never reused.
    #[sea_orm(unique)]
    pub storage_key: String,

    pub size_bytes: i64,
    pub content_type: String,

    /// Hex SHA-256 of the content. Unique per owner (see `seed::ensure_indexes`).
    pub checksum: String,

    pub favorite: bool,
    pub archived: bool,
    pub trashed: bool,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
