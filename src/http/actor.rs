use crate::domain::context::{build_context, client_ip, user_agent, RequestContext};
use crate::domain::user::UserRole;
use crate::error::{AppError, AppResult};
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The auth proxy in front of the service forwards the signed-in user.
pub fn actor_context(headers: &HeaderMap) -> AppResult<RequestContext> {
    let (Some(raw_id), Some(raw_role)) = (header(headers, ACTOR_ID_HEADER), header(headers, ACTOR_ROLE_HEADER)) else {
        return Err(AppError::Unauthenticated("Authentication required".to_string()));
    };
    let actor_id = Uuid::parse_str(raw_id)
        .map_err(|_| AppError::Unauthenticated("Invalid actor identity".to_string()))?;
    let role: UserRole = raw_role
        .parse()
        .map_err(|_| AppError::Unauthenticated("Invalid actor role".to_string()))?;
    Ok(build_context(actor_id, role, headers))
}

pub fn system_context(headers: &HeaderMap) -> RequestContext {
    RequestContext::system(client_ip(headers), user_agent(headers))
}

/// Decodes a JSON body, reporting shape problems as a 400 with details.
pub fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> AppResult<T> {
    serde_json::from_value(body).map_err(|e| {
        AppError::validation_with("Validation failed", json!([{ "message": e.to_string() }]))
    })
}
