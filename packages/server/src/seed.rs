use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder, SqliteQueryBuilder};
use sea_orm::*;
use tracing::{info, warn};

use crate::config::AdminConfig;
use crate::entity::{image, user};
use crate::utils::hash;

/// Create the admin account described by `admin` if it does not exist yet.
///
/// An existing user with the same name is left untouched.
pub async fn ensure_admin_user(db: &DatabaseConnection, admin: &AdminConfig) -> Result<(), DbErr> {
    if !admin.enabled {
        return Ok(());
    }
    if admin.password.is_empty() {
        warn!("Admin bootstrap enabled but no password configured; skipping");
        return Ok(());
    }

    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(&admin.username))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password = hash::hash_password(&admin.password)
        .map_err(|e| DbErr::Custom(format!("Password hash error: {e}")))?;

    let model = user::ActiveModel {
        username: Set(admin.username.clone()),
        password: Set(password),
        role: Set(user::ADMIN_ROLE.to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    match user::Entity::insert(model)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(user::Column::Username)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await
    {
        Ok(_) => info!(username = %admin.username, "Admin user created"),
        Err(DbErr::RecordNotInserted) => {}
        Err(e) => return Err(e),
    }

    Ok(())
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Per-owner dedup. This is the authoritative duplicate guard; the
    // lookup before upload is only an early exit.
    let stmt = Index::create()
        .if_not_exists()
        .unique()
        .name("idx_image_owner_checksum")
        .table(image::Entity)
        .col(image::Column::OwnerId)
        .col(image::Column::Checksum)
        .to_owned();
    execute_index(db, &stmt).await?;
    info!("Ensured index idx_image_owner_checksum exists");

    // Listing queries:
    // SELECT ... FROM image WHERE owner_id = ? AND trashed = ? ORDER BY created_at
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_image_owner_trashed_created")
        .table(image::Entity)
        .col(image::Column::OwnerId)
        .col(image::Column::Trashed)
        .col(image::Column::CreatedAt)
        .to_owned();

    match execute_index(db, &stmt).await {
        Ok(_) => info!("Ensured index idx_image_owner_trashed_created exists"),
        Err(e) => warn!(
            "Failed to create index idx_image_owner_trashed_created: {}",
            e
        ),
    }

    Ok(())
}

async fn execute_index(db: &DatabaseConnection, stmt: &IndexCreateStatement) -> Result<(), DbErr> {
    let sql = match db.get_database_backend() {
        DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
        _ => stmt.to_string(PostgresQueryBuilder),
    };
    db.execute_unprepared(&sql).await?;
    Ok(())
}
