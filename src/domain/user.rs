use crate::domain::payment::MAX_PAGE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    SuperAdmin,
    Moderator,
    Company,
    Caregiver,
    Guardian,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "SUPER_ADMIN",
            UserRole::Moderator => "MODERATOR",
            UserRole::Company => "COMPANY",
            UserRole::Caregiver => "CAREGIVER",
            UserRole::Guardian => "GUARDIAN",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::SuperAdmin | UserRole::Moderator)
    }

    /// Caregivers and agencies go through document review before trading.
    pub fn initial_kyc_status(&self) -> KycStatus {
        match self {
            UserRole::Caregiver | UserRole::Company => KycStatus::Pending,
            _ => KycStatus::Verified,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUPER_ADMIN" => Ok(UserRole::SuperAdmin),
            "MODERATOR" => Ok(UserRole::Moderator),
            "COMPANY" => Ok(UserRole::Company),
            "CAREGIVER" => Ok(UserRole::Caregiver),
            "GUARDIAN" => Ok(UserRole::Guardian),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "PENDING",
            KycStatus::Verified => "VERIFIED",
            KycStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for KycStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(KycStatus::Pending),
            "VERIFIED" => Ok(KycStatus::Verified),
            "REJECTED" => Ok(KycStatus::Rejected),
            other => Err(format!("unknown kyc status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Bn,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Bn => "bn",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Language::En),
            "bn" => Ok(Language::Bn),
            other => Err(format!("unknown language: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub role: UserRole,
    pub phone: String,
    pub email: Option<String>,
    pub name: String,
    pub language: Language,
    pub kyc_status: KycStatus,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field-level change applied by administrative actions.
#[derive(Debug, Clone, Default)]
pub struct UserMutation {
    pub is_active: Option<bool>,
    pub kyc_status: Option<KycStatus>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub language: Option<Language>,
    pub password_hash: Option<String>,
}

impl UserMutation {
    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(v) = self.is_active {
            user.is_active = v;
        }
        if let Some(v) = self.kyc_status {
            user.kyc_status = v;
        }
        if let Some(v) = self.deleted_at {
            user.deleted_at = Some(v);
        }
        if let Some(v) = &self.name {
            user.name = v.clone();
        }
        if let Some(v) = &self.email {
            user.email = Some(v.clone());
        }
        if let Some(v) = self.language {
            user.language = v;
        }
        if let Some(v) = &self.password_hash {
            user.password_hash = v.clone();
        }
        user.updated_at = now;
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub role: Option<UserRole>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub language: Option<Language>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<UserRole>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub kyc_status: Option<KycStatus>,
}

impl UserFilter {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}
