use crate::domain::context::RequestContext;
use crate::domain::user::UserRole;
use crate::error::{AppError, AppResult};

pub mod bulk_actions;
pub mod payment_service;
pub mod user_service;

pub const ADMIN_ROLES: &[UserRole] = &[UserRole::SuperAdmin, UserRole::Moderator];

pub fn require_role(ctx: &RequestContext, allowed: &[UserRole]) -> AppResult<()> {
    if allowed.contains(&ctx.actor_role) {
        return Ok(());
    }
    Err(AppError::Authorization(format!(
        "role {} may not perform this action",
        ctx.actor_role
    )))
}
