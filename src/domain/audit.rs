use crate::domain::context::RequestContext;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const ENTITY_USER: &str = "USER";
pub const ENTITY_PAYMENT: &str = "PAYMENT";

/// Append-only record; nothing in the crate updates or deletes one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub actor_role: String,
    pub action_type: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub changes: Option<serde_json::Value>,
    pub ip_address: String,
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        ctx: &RequestContext,
        action_type: &str,
        entity_type: &str,
        entity_id: Uuid,
        changes: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: ctx.actor_id,
            actor_role: ctx.actor_role.as_str().to_string(),
            action_type: action_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            changes,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            timestamp: Utc::now(),
        }
    }
}
