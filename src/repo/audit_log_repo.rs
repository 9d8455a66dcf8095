use crate::domain::audit::AuditLogEntry;
use crate::repo::AuditLogStore;
use anyhow::Result;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct AuditLogRepo {
    pub pool: PgPool,
}

impl AuditLogRepo {
    /// Written inside the caller's transaction so the entry commits with the mutation.
    pub async fn insert_tx(tx: &mut Transaction<'_, Postgres>, entry: &AuditLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, actor_id, actor_role, action_type, entity_type, entity_id,
                changes, ip_address, user_agent, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_id)
        .bind(&entry.actor_role)
        .bind(&entry.action_type)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.changes)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.timestamp)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl AuditLogStore for AuditLogRepo {
    async fn for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, actor_id, actor_role, action_type, entity_type, entity_id,
                   changes, ip_address, user_agent, created_at
            FROM audit_logs
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AuditLogEntry {
                id: r.get("id"),
                actor_id: r.get("actor_id"),
                actor_role: r.get("actor_role"),
                action_type: r.get("action_type"),
                entity_type: r.get("entity_type"),
                entity_id: r.get("entity_id"),
                changes: r.get("changes"),
                ip_address: r.get("ip_address"),
                user_agent: r.get("user_agent"),
                timestamp: r.get("created_at"),
            })
            .collect())
    }
}
