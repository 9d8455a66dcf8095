use crate::error::AppResult;
use crate::http::actor::system_context;
use crate::http::extract::ApiPath;
use crate::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

fn provider_header<'a>(headers: &'a HeaderMap, provider: &str, suffix: &str) -> &'a str {
    headers
        .get(format!("x-{provider}-{suffix}"))
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
}

/// `POST /api/payments/webhooks/:provider`, signed with
/// `x-<provider>-signature` over `<body>&<x-<provider>-timestamp>`.
pub async fn receive(
    State(state): State<AppState>,
    ApiPath(provider): ApiPath<String>,
    headers: HeaderMap,
    body: String,
) -> AppResult<Response> {
    let provider = provider.to_ascii_lowercase();
    let signature = provider_header(&headers, &provider, "signature");
    let timestamp = provider_header(&headers, &provider, "timestamp");
    let ctx = system_context(&headers);

    let ack = state
        .payment_service
        .handle_webhook(&provider, &body, signature, timestamp, &ctx)
        .await?;
    Ok(Json(json!({ "success": true, "data": ack })).into_response())
}
