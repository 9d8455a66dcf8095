use crate::domain::audit::{AuditLogEntry, ENTITY_USER};
use crate::domain::context::RequestContext;
use crate::domain::payment::Pagination;
use crate::domain::user::{CreateUserRequest, Language, UpdateUserRequest, User, UserFilter, UserMutation, UserRole};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::repo::{SessionStore, UserStore};
use crate::service::{require_role, ADMIN_ROLES};
use anyhow::Context;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_DEACTIVATION_REASON: &str = "Administrative deactivation";
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct UserService {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub bcrypt_cost: u32,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            users,
            sessions,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub async fn create_user(&self, req: CreateUserRequest, ctx: &RequestContext) -> AppResult<User> {
        require_role(ctx, &[UserRole::SuperAdmin])?;

        let (Some(role), Some(phone), Some(password), Some(name)) = (
            req.role,
            non_blank(req.phone),
            req.password.filter(|p| !p.is_empty()),
            non_blank(req.name),
        ) else {
            return Err(AppError::validation("Missing required fields: role, phone, password, name"));
        };

        let mut problems = Vec::new();
        if password.chars().count() < MIN_PASSWORD_LEN {
            problems.push(json!({ "field": "password", "message": "Password must be at least 8 characters" }));
        }
        problems.extend(name_problem(&name));
        let email = non_blank(req.email);
        if let Some(email) = email.as_deref() {
            problems.extend(email_problem(email));
        }
        if !problems.is_empty() {
            return Err(AppError::validation_with("Validation failed", json!(problems)));
        }

        if self
            .users
            .find_by_phone_or_email(&phone, email.as_deref())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User with this phone or email already exists".to_string(),
            ));
        }

        let password_hash = self.hash_password(password).await?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            role,
            phone,
            email,
            name,
            language: req.language.unwrap_or(Language::En),
            kyc_status: role.initial_kyc_status(),
            is_active: true,
            password_hash,
            deleted_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        let audit = AuditLogEntry::new(
            ctx,
            "USER_CREATED",
            ENTITY_USER,
            user.id,
            Some(json!({ "role": user.role, "phone": user.phone, "email": user.email, "name": user.name })),
        );
        self.users.insert(&user, audit).await.map_err(duplicate_as_conflict)?;
        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    /// Users edit themselves; admins may edit anyone by passing `userId`.
    pub async fn update_profile(&self, req: UpdateUserRequest, ctx: &RequestContext) -> AppResult<User> {
        let target = req.user_id.unwrap_or(ctx.actor_id);
        if target != ctx.actor_id && !ctx.actor_role.is_admin() {
            return Err(AppError::Authorization(
                "You can only update your own profile".to_string(),
            ));
        }

        let mut problems = Vec::new();
        if let Some(name) = req.name.as_deref() {
            problems.extend(name_problem(name));
        }
        if let Some(email) = req.email.as_deref() {
            problems.extend(email_problem(email));
        }
        if let Some(new_password) = req.new_password.as_deref() {
            if new_password.chars().count() < MIN_PASSWORD_LEN {
                problems.push(json!({ "field": "newPassword", "message": "Password must be at least 8 characters" }));
            }
            if req.current_password.as_deref().map_or(true, str::is_empty) {
                problems.push(json!({ "field": "currentPassword", "message": "Current password is required" }));
            }
        }
        if !problems.is_empty() {
            return Err(AppError::validation_with("Validation failed", json!(problems)));
        }

        let current = self
            .users
            .get(target)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if let Some(email) = req.email.as_deref() {
            if let Some(owner) = self.users.find_by_email(email).await? {
                if owner.id != target {
                    return Err(AppError::Conflict("User with this phone or email already exists".to_string()));
                }
            }
        }

        let password_hash = match (req.current_password, req.new_password) {
            (Some(current_password), Some(new_password)) => {
                if !self.verify_password(current_password, current.password_hash.clone()).await? {
                    tracing::warn!(user_id = %target, actor = %ctx.actor_id, "password change with wrong current password");
                    return Err(AppError::Unauthenticated("Current password is incorrect".to_string()));
                }
                Some(self.hash_password(new_password).await?)
            }
            _ => None,
        };
        let password_changed = password_hash.is_some();

        let mutation = UserMutation {
            name: req.name.clone(),
            email: req.email.clone(),
            language: req.language,
            password_hash,
            ..Default::default()
        };
        let audit = AuditLogEntry::new(
            ctx,
            "USER_UPDATED",
            ENTITY_USER,
            target,
            Some(json!({
                "old": { "name": current.name, "email": current.email, "language": current.language },
                "new": { "name": req.name, "email": req.email, "language": req.language },
                "passwordChanged": password_changed,
            })),
        );

        let updated = self
            .users
            .update(target, &mutation, audit)
            .await
            .map_err(duplicate_as_conflict)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        tracing::info!(user_id = %target, actor = %ctx.actor_id, "user profile updated");
        Ok(updated)
    }

    pub async fn deactivate_user(&self, user_id: Uuid, reason: Option<String>, ctx: &RequestContext) -> AppResult<User> {
        require_role(ctx, &[UserRole::SuperAdmin])?;
        let reason = non_blank(reason).unwrap_or_else(|| DEFAULT_DEACTIVATION_REASON.to_string());

        let current = self
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let revoked = self.sessions.revoke_all(user_id).await?;

        let mutation = UserMutation {
            is_active: Some(false),
            ..Default::default()
        };
        let audit = AuditLogEntry::new(
            ctx,
            "USER_DEACTIVATED",
            ENTITY_USER,
            user_id,
            Some(json!({ "reason": reason, "previousState": current.is_active, "newState": false })),
        );
        let updated = self
            .users
            .update(user_id, &mutation, audit)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        tracing::info!(%user_id, revoked, %reason, "user deactivated");
        Ok(updated)
    }

    async fn hash_password(&self, password: String) -> AppResult<String> {
        let cost = self.bcrypt_cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .context("password hashing task panicked")?
            .context("could not hash password")?;
        Ok(hash)
    }

    async fn verify_password(&self, password: String, hash: String) -> AppResult<bool> {
        let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .context("password check task panicked")?
            .context("stored password hash is unreadable")?;
        Ok(ok)
    }

    pub async fn list_users(&self, filter: UserFilter, ctx: &RequestContext) -> AppResult<(Vec<User>, Pagination)> {
        require_role(ctx, ADMIN_ROLES)?;
        let (users, total) = self.users.list(&filter).await?;
        Ok((users, Pagination::new(filter.page(), filter.limit(), total)))
    }
}

fn duplicate_as_conflict(err: anyhow::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("User with this phone or email already exists".to_string())
    } else {
        AppError::from(err)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn name_problem(name: &str) -> Option<serde_json::Value> {
    let len = name.trim().chars().count();
    if len < 2 {
        Some(json!({ "field": "name", "message": "Name must be at least 2 characters" }))
    } else if len > 100 {
        Some(json!({ "field": "name", "message": "Name must be less than 100 characters" }))
    } else {
        None
    }
}

fn email_problem(email: &str) -> Option<serde_json::Value> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    (!valid).then(|| json!({ "field": "email", "message": "Valid email is required" }))
}
