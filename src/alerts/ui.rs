use super::traits::{AlertPayload, AlertSink};
use crate::error::AlertError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// In-app channel: alerts become notification rows the platform UI reads.
/// Always available — no external dependency beyond the database.
pub struct UiAlertSink {
    pool: SqlitePool,
}

impl UiAlertSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertSink for UiAlertSink {
    fn channel(&self) -> &'static str {
        "ui"
    }

    async fn send(&self, alert: &AlertPayload) -> Result<(), AlertError> {
        sqlx::query(
            "INSERT INTO notifications (id, organization_id, board_id, title, body, severity, read, created_at)
             VALUES (?, ?, ?, ?, ?, 'warning', 0, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&alert.organization_id)
        .bind(&alert.board_id)
        .bind(format!("Continuity alert: {}", alert.agent_name))
        .bind(&alert.message)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AlertError::Delivery {
            channel: "ui".to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{apply_migrations, open_memory_pool};
    use sqlx::Row;

    #[tokio::test]
    async fn send_writes_notification_row() {
        let pool = open_memory_pool().await.unwrap();
        apply_migrations(&pool).await.unwrap();

        let sink = UiAlertSink::new(pool.clone());
        sink.send(&AlertPayload {
            organization_id: "org-1".into(),
            board_id: "board-1".into(),
            board_name: "ops".into(),
            agent_id: "agent-1".into(),
            agent_name: "scout".into(),
            reason: "stale_heartbeat".into(),
            message: "Agent 'scout' went stale".into(),
        })
        .await
        .unwrap();

        let row = sqlx::query("SELECT title, body, severity, read FROM notifications")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(
            row.get::<String, _>("title"),
            "Continuity alert: scout"
        );
        assert!(row.get::<String, _>("body").contains("stale"));
        assert_eq!(row.get::<String, _>("severity"), "warning");
        assert_eq!(row.get::<i64, _>("read"), 0);
    }
}
