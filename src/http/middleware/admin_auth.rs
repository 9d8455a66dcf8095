use crate::error::AppError;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hmac::digest::CtOutput;

pub const INTERNAL_KEY_HEADER: &str = "X-Internal-Api-Key";

fn keys_match(provided: &str, expected: &str) -> bool {
    use sha2::{Digest, Sha256};
    // Compare digests so timing does not depend on where the keys differ.
    let a: CtOutput<Sha256> = CtOutput::new(Sha256::digest(provided.as_bytes()));
    let b: CtOutput<Sha256> = CtOutput::new(Sha256::digest(expected.as_bytes()));
    a == b
}

/// Guards internal routes (audit reads) behind the shared service key.
pub async fn require_internal_api_key(
    State(expected): State<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(INTERNAL_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if expected.is_empty() || !keys_match(provided, &expected) {
        tracing::warn!(path = %request.uri().path(), "internal api key rejected");
        return AppError::Unauthenticated("Invalid internal API key".to_string()).into_response();
    }

    next.run(request).await
}
