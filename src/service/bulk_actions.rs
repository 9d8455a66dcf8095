use crate::domain::audit::{AuditLogEntry, ENTITY_USER};
use crate::domain::bulk::{BulkAction, BulkActionReport, BulkActionRequest, BulkActionResult};
use crate::domain::context::RequestContext;
use crate::domain::user::User;
use crate::error::{AppError, AppResult};
use crate::repo::{SessionStore, UserStore};
use crate::service::{require_role, ADMIN_ROLES};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum BulkItemError {
    #[error("Invalid user ID")]
    InvalidId,

    #[error("User not found")]
    NotFound,

    #[error("{0}")]
    Store(#[from] anyhow::Error),
}

/// Applies one administrative action to many users. Items are independent:
/// a failure is recorded against its ID and the batch keeps going.
#[derive(Clone)]
pub struct BulkActionProcessor {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub concurrency: usize,
}

impl BulkActionProcessor {
    pub fn new(users: Arc<dyn UserStore>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            users,
            sessions,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn process(&self, req: BulkActionRequest, ctx: &RequestContext) -> AppResult<BulkActionReport> {
        require_role(ctx, ADMIN_ROLES)?;
        if req.user_ids.is_empty() {
            return Err(AppError::validation_with(
                "Validation failed",
                json!([{ "field": "userIds", "message": "At least one user ID is required" }]),
            ));
        }

        let action = req.action;
        let reason = req.reason.clone();

        // `buffered` keeps results in input order regardless of completion order.
        let results: Vec<BulkActionResult> = stream::iter(req.user_ids)
            .map(|raw_id| {
                let reason = reason.clone();
                async move {
                    match self.apply_one(&raw_id, action, reason, ctx).await {
                        Ok(user) => BulkActionResult::ok(raw_id, action, user),
                        Err(err) => {
                            tracing::warn!(user_id = %raw_id, action = action.as_str(), error = %err, "bulk item failed");
                            BulkActionResult::failed(raw_id, action, err.to_string())
                        }
                    }
                }
            })
            .buffered(self.concurrency.max(1))
            .collect()
            .await;

        let report = BulkActionReport::new(action, results);
        tracing::info!(
            action = action.as_str(),
            actor = %ctx.actor_id,
            total = report.summary.total,
            successful = report.summary.successful,
            failed = report.summary.failed,
            "bulk action finished"
        );
        Ok(report)
    }

    async fn apply_one(
        &self,
        raw_id: &str,
        action: BulkAction,
        reason: Option<String>,
        ctx: &RequestContext,
    ) -> Result<User, BulkItemError> {
        let user_id = Uuid::parse_str(raw_id.trim()).map_err(|_| BulkItemError::InvalidId)?;
        if self.users.get(user_id).await?.is_none() {
            return Err(BulkItemError::NotFound);
        }

        if action.revokes_sessions() {
            let revoked = self.sessions.revoke_all(user_id).await?;
            tracing::debug!(%user_id, revoked, "sessions revoked before {}", action.as_str());
        }

        let audit = AuditLogEntry::new(
            ctx,
            action.audit_action_type(),
            ENTITY_USER,
            user_id,
            Some(json!({ "action": action, "reason": reason })),
        );
        self.users
            .update(user_id, &action.mutation(Utc::now()), audit)
            .await?
            .ok_or(BulkItemError::NotFound)
    }
}
