use crate::domain::user::UserRole;
use axum::http::HeaderMap;
use uuid::Uuid;

/// Who is acting and from where; carried into every audit entry.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor_id: Uuid,
    pub actor_role: UserRole,
    pub ip_address: String,
    pub user_agent: String,
}

impl RequestContext {
    pub fn new(actor_id: Uuid, actor_role: UserRole) -> Self {
        Self {
            actor_id,
            actor_role,
            ip_address: "unknown".to_string(),
            user_agent: "Unknown".to_string(),
        }
    }

    /// Context for provider callbacks, which have no logged-in actor.
    pub fn system(ip_address: String, user_agent: String) -> Self {
        Self {
            actor_id: Uuid::nil(),
            actor_role: UserRole::SuperAdmin,
            ip_address,
            user_agent,
        }
    }
}

pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .unwrap_or("unknown")
        .to_string()
}

pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("Unknown")
        .to_string()
}

pub fn build_context(actor_id: Uuid, actor_role: UserRole, headers: &HeaderMap) -> RequestContext {
    RequestContext {
        actor_id,
        actor_role,
        ip_address: client_ip(headers),
        user_agent: user_agent(headers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));
        let ctx = build_context(Uuid::new_v4(), UserRole::Moderator, &headers);
        assert_eq!(ctx.ip_address, "10.0.0.7");
    }

    #[test]
    fn falls_back_to_real_ip_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));
        assert_eq!(client_ip(&headers), "192.168.1.1");
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
        assert_eq!(user_agent(&HeaderMap::new()), "Unknown");
    }
}
