use crate::domain::context::client_ip;
use crate::error::AppError;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use redis::AsyncCommands;

/// Fixed one-minute window per client IP, counted in Redis.
#[derive(Clone)]
pub struct RateLimitState {
    pub redis_client: redis::Client,
    pub max_per_minute: i64,
    pub key_prefix: String,
}

impl RateLimitState {
    fn window_key(&self, ip: &str, now: chrono::DateTime<chrono::Utc>) -> String {
        format!("{}:{}:{}", self.key_prefix, ip, now.format("%Y%m%d%H%M"))
    }
}

pub async fn enforce(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers());
    let key = state.window_key(&ip, chrono::Utc::now());

    // Fails open when Redis is unreachable.
    match state.redis_client.get_multiplexed_async_connection().await {
        Ok(mut conn) => {
            let count: i64 = conn.incr(&key, 1).await.unwrap_or(1);
            let _: bool = conn.expire(&key, 120).await.unwrap_or(false);
            if count > state.max_per_minute {
                tracing::warn!(%ip, count, "rate limit exceeded");
                return AppError::RateLimited.into_response();
            }
        }
        Err(e) => tracing::debug!(error = %e, "rate limiter unavailable"),
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn keys_are_per_ip_and_minute() {
        let state = RateLimitState {
            redis_client: redis::Client::open("redis://127.0.0.1:6379/").unwrap(),
            max_per_minute: 300,
            key_prefix: "carenet:rate".to_string(),
        };
        let t = chrono::Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(state.window_key("10.0.0.7", t), "carenet:rate:10.0.0.7:202603140926");
    }
}
