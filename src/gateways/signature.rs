use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex HMAC-SHA256 over `"{payload}&{timestamp}"`.
pub fn sign(secret: &str, payload: &str, timestamp: &str) -> String {
    keyed(secret, payload, timestamp)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Constant-time check of a provider callback signature.
pub fn verify(secret: &str, payload: &str, signature: &str, timestamp: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };

    keyed(secret, payload, timestamp).is_some_and(|mac| mac.verify_slice(&provided).is_ok())
}

fn keyed(secret: &str, payload: &str, timestamp: &str) -> Option<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    mac.update(b"&");
    mac.update(timestamp.as_bytes());
    Some(mac)
}
