pub mod gate;
pub mod migrations;

pub use gate::MigrationGate;
pub use migrations::{apply_migrations, applied_revision, expected_head_revision};

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;

/// Open the sqlite pool backing all Warden state.
///
/// Does not run migrations: deploys apply those explicitly (`warden migrate`)
/// so the readiness gate can hold sweeps back on half-rolled fleets.
pub async fn open_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
    }

    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    configure_pragmas(&pool).await?;
    Ok(pool)
}

/// In-memory pool for tests and ephemeral tooling. Single connection so the
/// database outlives individual acquires.
///
/// ```
/// # tokio_test::block_on(async {
/// let pool = warden::db::open_memory_pool().await.unwrap();
/// warden::db::apply_migrations(&pool).await.unwrap();
/// # });
/// ```
pub async fn open_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;
    configure_pragmas(&pool).await?;
    Ok(pool)
}

async fn configure_pragmas(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .context("Failed to enable foreign keys")?;
    sqlx::query("PRAGMA journal_mode = WAL;")
        .execute(pool)
        .await
        .context("Failed to set journal mode")?;
    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .context("Failed to set synchronous mode")?;
    Ok(())
}
