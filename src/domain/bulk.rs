use crate::domain::user::{KycStatus, User, UserMutation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkAction {
    Activate,
    Deactivate,
    Delete,
    VerifyKyc,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Activate => "ACTIVATE",
            BulkAction::Deactivate => "DEACTIVATE",
            BulkAction::Delete => "DELETE",
            BulkAction::VerifyKyc => "VERIFY_KYC",
        }
    }

    pub fn audit_action_type(&self) -> &'static str {
        match self {
            BulkAction::Activate => "USER_ACTIVATED",
            BulkAction::Deactivate => "USER_DEACTIVATED",
            BulkAction::Delete => "USER_DELETED",
            BulkAction::VerifyKyc => "USER_KYC_VERIFIED",
        }
    }

    /// Delete is soft: the row stays, marked inactive with a tombstone.
    pub fn mutation(&self, now: DateTime<Utc>) -> UserMutation {
        match self {
            BulkAction::Activate => UserMutation {
                is_active: Some(true),
                ..Default::default()
            },
            BulkAction::Deactivate => UserMutation {
                is_active: Some(false),
                ..Default::default()
            },
            BulkAction::Delete => UserMutation {
                is_active: Some(false),
                deleted_at: Some(now),
                ..Default::default()
            },
            BulkAction::VerifyKyc => UserMutation {
                kyc_status: Some(KycStatus::Verified),
                ..Default::default()
            },
        }
    }

    pub fn revokes_sessions(&self) -> bool {
        matches!(self, BulkAction::Deactivate | BulkAction::Delete)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionRequest {
    #[serde(default)]
    pub user_ids: Vec<String>,
    pub action: BulkAction,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionResult {
    pub user_id: String,
    pub success: bool,
    pub action: BulkAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkActionResult {
    pub fn ok(user_id: String, action: BulkAction, user: User) -> Self {
        Self {
            user_id,
            success: true,
            action,
            data: Some(user),
            error: None,
        }
    }

    pub fn failed(user_id: String, action: BulkAction, error: impl Into<String>) -> Self {
        Self {
            user_id,
            success: false,
            action,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkActionReport {
    pub action: BulkAction,
    pub results: Vec<BulkActionResult>,
    pub summary: BulkSummary,
}

impl BulkActionReport {
    pub fn new(action: BulkAction, results: Vec<BulkActionResult>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        let summary = BulkSummary {
            total: results.len(),
            successful,
            failed: results.len() - successful,
        };
        Self {
            action,
            results,
            summary,
        }
    }
}
