use super::types::{AgentRecord, AgentStatus, Board, Organization};
use crate::util::{parse_rfc3339, parse_rfc3339_opt};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub async fn create_organization(pool: &SqlitePool, name: &str) -> Result<Organization> {
    let org = Organization {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        created_at: Utc::now(),
    };
    sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?, ?, ?)")
        .bind(&org.id)
        .bind(&org.name)
        .bind(org.created_at.to_rfc3339())
        .execute(pool)
        .await
        .context("Failed to insert organization")?;
    Ok(org)
}

pub async fn create_board(pool: &SqlitePool, organization_id: &str, name: &str) -> Result<Board> {
    let board = Board {
        id: Uuid::new_v4().to_string(),
        organization_id: organization_id.to_string(),
        name: name.to_string(),
        created_at: Utc::now(),
    };
    sqlx::query("INSERT INTO boards (id, organization_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(&board.id)
        .bind(&board.organization_id)
        .bind(&board.name)
        .bind(board.created_at.to_rfc3339())
        .execute(pool)
        .await
        .context("Failed to insert board")?;
    Ok(board)
}

pub async fn create_agent(
    pool: &SqlitePool,
    board_id: &str,
    organization_id: &str,
    name: &str,
    runtime_session_id: Option<&str>,
) -> Result<AgentRecord> {
    let now = Utc::now();
    let agent = AgentRecord {
        id: Uuid::new_v4().to_string(),
        board_id: board_id.to_string(),
        organization_id: organization_id.to_string(),
        name: name.to_string(),
        runtime_session_id: runtime_session_id.map(ToString::to_string),
        last_seen_at: None,
        status: AgentStatus::Active,
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO agents (
            id, board_id, organization_id, name, runtime_session_id,
            last_seen_at, status, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?)",
    )
    .bind(&agent.id)
    .bind(&agent.board_id)
    .bind(&agent.organization_id)
    .bind(&agent.name)
    .bind(agent.runtime_session_id.as_deref())
    .bind(agent.status.as_db())
    .bind(agent.created_at.to_rfc3339())
    .bind(agent.updated_at.to_rfc3339())
    .execute(pool)
    .await
    .context("Failed to insert agent")?;
    Ok(agent)
}

pub async fn list_boards(pool: &SqlitePool) -> Result<Vec<Board>> {
    let rows = sqlx::query(
        "SELECT id, organization_id, name, created_at FROM boards ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list boards")?;

    let mut boards = Vec::with_capacity(rows.len());
    for row in rows {
        boards.push(row_to_board(&row)?);
    }
    Ok(boards)
}

pub async fn get_board(pool: &SqlitePool, board_id: &str) -> Result<Option<Board>> {
    let row = sqlx::query("SELECT id, organization_id, name, created_at FROM boards WHERE id = ?")
        .bind(board_id)
        .fetch_optional(pool)
        .await
        .context("Failed to load board")?;
    row.as_ref().map(row_to_board).transpose()
}

pub async fn agents_for_board(pool: &SqlitePool, board_id: &str) -> Result<Vec<AgentRecord>> {
    let rows = sqlx::query(
        "SELECT id, board_id, organization_id, name, runtime_session_id,
                last_seen_at, status, created_at, updated_at
         FROM agents WHERE board_id = ? ORDER BY created_at ASC",
    )
    .bind(board_id)
    .fetch_all(pool)
    .await
    .context("Failed to list agents for board")?;

    let mut agents = Vec::with_capacity(rows.len());
    for row in rows {
        agents.push(row_to_agent(&row)?);
    }
    Ok(agents)
}

pub async fn get_agent(pool: &SqlitePool, agent_id: &str) -> Result<Option<AgentRecord>> {
    let row = sqlx::query(
        "SELECT id, board_id, organization_id, name, runtime_session_id,
                last_seen_at, status, created_at, updated_at
         FROM agents WHERE id = ?",
    )
    .bind(agent_id)
    .fetch_optional(pool)
    .await
    .context("Failed to load agent")?;
    row.as_ref().map(row_to_agent).transpose()
}

/// Heartbeat write: refresh `last_seen_at` and flip the agent back to active.
/// This is the default `emit` behind the heartbeat guard.
pub async fn record_heartbeat(
    pool: &SqlitePool,
    agent_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE agents SET last_seen_at = ?, status = 'active', updated_at = ? WHERE id = ?",
    )
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .bind(agent_id)
    .execute(pool)
    .await
    .context("Failed to record heartbeat")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("agent '{agent_id}' not found");
    }
    Ok(())
}

pub async fn set_agent_session(
    pool: &SqlitePool,
    agent_id: &str,
    runtime_session_id: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE agents SET runtime_session_id = ?, updated_at = ? WHERE id = ?")
        .bind(runtime_session_id)
        .bind(Utc::now().to_rfc3339())
        .bind(agent_id)
        .execute(pool)
        .await
        .context("Failed to update agent session")?;
    Ok(())
}

fn row_to_board(row: &SqliteRow) -> Result<Board> {
    Ok(Board {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        name: row.try_get("name")?,
        created_at: parse_rfc3339(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn row_to_agent(row: &SqliteRow) -> Result<AgentRecord> {
    let status: String = row.try_get("status")?;
    Ok(AgentRecord {
        id: row.try_get("id")?,
        board_id: row.try_get("board_id")?,
        organization_id: row.try_get("organization_id")?,
        name: row.try_get("name")?,
        runtime_session_id: row.try_get("runtime_session_id")?,
        last_seen_at: parse_rfc3339_opt(row.try_get("last_seen_at")?)?,
        status: AgentStatus::from_db(&status),
        created_at: parse_rfc3339(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_rfc3339(&row.try_get::<String, _>("updated_at")?)?,
    })
}
