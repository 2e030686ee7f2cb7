use crate::api::handlers::auth::create_user;
use crate::entities::{prelude::*, users};
use crate::utils::validation::validate_username;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::env;
use tracing::info;

/// Creates the bootstrap account from `ADMIN_USERNAME`/`ADMIN_PASSWORD`.
///
/// Uploads and registration both require a login, so without this a fresh
/// database has no way in.
pub async fn seed_admin(db: &DatabaseConnection) -> anyhow::Result<()> {
    let (Ok(username), Ok(password)) = (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD"))
    else {
        info!("🌱 ADMIN_USERNAME/ADMIN_PASSWORD not set, skipping admin seed");
        return Ok(());
    };

    seed_user(db, &username, &password).await
}

pub async fn seed_user(db: &DatabaseConnection, username: &str, password: &str) -> anyhow::Result<()> {
    validate_username(username)
        .map_err(|_| anyhow::anyhow!("Invalid seed username: {}", username))?;

    let exists = Users::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await?
        .is_some();
    if exists {
        return Ok(());
    }

    create_user(db, username, password)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to seed user {}: {}", username, e))?;

    info!("🌱 Seeded user {}", username);
    Ok(())
}
