use anyhow::{Context, Result, bail};
use sqlx::{Row, SqlitePool};

/// One schema revision: an identifier plus the statements that produce it.
pub struct Migration {
    pub revision: &'static str,
    pub statements: &'static [&'static str],
}

const SCHEMA_META_TABLE: &str = "CREATE TABLE IF NOT EXISTS warden_schema_meta (
    meta_key   TEXT PRIMARY KEY,
    meta_value TEXT NOT NULL
)";

const REVISION_KEY: &str = "revision";

/// Ordered manifest. Append-only: revisions already shipped never change.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        revision: "0001_tenancy",
        statements: &[
            "CREATE TABLE IF NOT EXISTS organizations (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS boards (
                id              TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organizations(id),
                name            TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS agents (
                id                 TEXT PRIMARY KEY,
                board_id           TEXT NOT NULL REFERENCES boards(id),
                organization_id    TEXT NOT NULL,
                name               TEXT NOT NULL,
                runtime_session_id TEXT,
                last_seen_at       TEXT,
                status             TEXT NOT NULL DEFAULT 'active',
                created_at         TEXT NOT NULL,
                updated_at         TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_agents_board ON agents(board_id)",
        ],
    },
    Migration {
        revision: "0002_recovery",
        statements: &[
            "CREATE TABLE IF NOT EXISTS recovery_policies (
                organization_id       TEXT PRIMARY KEY,
                enabled               INTEGER NOT NULL DEFAULT 1,
                stale_after_seconds   INTEGER NOT NULL,
                max_restarts_per_hour INTEGER NOT NULL,
                cooldown_seconds      INTEGER NOT NULL,
                alert_dedupe_seconds  INTEGER NOT NULL,
                alert_telegram        INTEGER NOT NULL DEFAULT 1,
                alert_whatsapp        INTEGER NOT NULL DEFAULT 1,
                alert_ui              INTEGER NOT NULL DEFAULT 1,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS recovery_incidents (
                id              TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                board_id        TEXT,
                agent_id        TEXT,
                status          TEXT NOT NULL,
                reason          TEXT NOT NULL,
                action          TEXT,
                attempts        INTEGER NOT NULL DEFAULT 0,
                last_error      TEXT,
                detected_at     TEXT NOT NULL,
                recovered_at    TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_incidents_agent_status
                ON recovery_incidents(agent_id, status)",
            "CREATE TABLE IF NOT EXISTS recovery_attempts (
                id           TEXT PRIMARY KEY,
                agent_id     TEXT NOT NULL,
                incident_id  TEXT NOT NULL,
                attempted_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_attempts_agent_time
                ON recovery_attempts(agent_id, attempted_at)",
        ],
    },
    Migration {
        revision: "0003_alerts",
        statements: &[
            "CREATE TABLE IF NOT EXISTS alert_log (
                id              TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                agent_id        TEXT NOT NULL,
                reason          TEXT NOT NULL,
                channels        TEXT NOT NULL,
                message         TEXT NOT NULL,
                sent_at         TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_alert_log_dedupe
                ON alert_log(agent_id, reason, sent_at)",
            "CREATE TABLE IF NOT EXISTS notifications (
                id              TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                board_id        TEXT,
                title           TEXT NOT NULL,
                body            TEXT NOT NULL,
                severity        TEXT NOT NULL DEFAULT 'warning',
                read            INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            )",
        ],
    },
    Migration {
        revision: "0004_telemetry_runs",
        statements: &[
            "CREATE TABLE IF NOT EXISTS runs (
                id              TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                board_id        TEXT,
                kind            TEXT NOT NULL DEFAULT 'continuity',
                metrics         TEXT NOT NULL DEFAULT '{}',
                started_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
        ],
    },
];

/// Head revision the running code expects the database to be at.
pub fn expected_head_revision() -> &'static str {
    MIGRATIONS.last().map_or("", |m| m.revision)
}

/// Read the applied revision marker. Errors (missing table, connectivity)
/// propagate so the caller can decide whether that means "not ready".
pub async fn applied_revision(pool: &SqlitePool) -> Result<Option<String>> {
    let row = sqlx::query("SELECT meta_value FROM warden_schema_meta WHERE meta_key = ?")
        .bind(REVISION_KEY)
        .fetch_optional(pool)
        .await
        .context("Failed to read schema revision marker")?;
    match row {
        Some(row) => Ok(Some(row.try_get("meta_value")?)),
        None => Ok(None),
    }
}

/// Apply every migration past the recorded marker, in manifest order, each in
/// its own transaction with the marker updated alongside.
pub async fn apply_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_META_TABLE)
        .execute(pool)
        .await
        .context("Failed to create schema meta table")?;

    let applied = applied_revision(pool).await?;

    let start_index = match applied.as_deref() {
        None => 0,
        Some(marker) => {
            let Some(pos) = MIGRATIONS.iter().position(|m| m.revision == marker) else {
                bail!(
                    "database revision '{marker}' is unknown to this build; \
                     refusing to migrate (newer code already ran here?)"
                );
            };
            pos + 1
        }
    };

    for migration in &MIGRATIONS[start_index..] {
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin migration transaction")?;
        for statement in migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Migration {} failed", migration.revision))?;
        }
        sqlx::query(
            "INSERT INTO warden_schema_meta (meta_key, meta_value) VALUES (?, ?)
             ON CONFLICT(meta_key) DO UPDATE SET meta_value = excluded.meta_value",
        )
        .bind(REVISION_KEY)
        .bind(migration.revision)
        .execute(&mut *tx)
        .await
        .context("Failed to record schema revision")?;
        tx.commit()
            .await
            .with_context(|| format!("Failed to commit migration {}", migration.revision))?;

        tracing::info!("applied schema migration {}", migration.revision);
    }

    Ok(())
}
