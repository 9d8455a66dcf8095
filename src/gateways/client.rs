use crate::gateways::GatewayError;
use reqwest::StatusCode;
use std::time::Duration;

/// Credentials and endpoint shared by the bKash and Nagad checkout APIs.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub username: String,
    pub password: String,
    pub app_key: String,
    pub app_secret: String,
    pub base_url: String,
}

impl ProviderCredentials {
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty()
            && !self.password.is_empty()
            && !self.app_key.is_empty()
            && !self.app_secret.is_empty()
            && !self.base_url.is_empty()
    }
}

#[derive(Clone)]
pub struct ProviderClient {
    pub provider: &'static str,
    pub credentials: ProviderCredentials,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl ProviderClient {
    pub fn new(provider: &'static str, credentials: ProviderCredentials, timeout_ms: u64) -> Self {
        Self {
            provider,
            credentials,
            timeout_ms,
            client: reqwest::Client::new(),
        }
    }

    /// POST a JSON body to `{base_url}{path}` and map the outcome onto [`GatewayError`].
    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        if !self.credentials.is_complete() {
            return Err(GatewayError::Disabled(self.provider.to_string()));
        }

        let url = format!("{}{}", self.credentials.base_url.trim_end_matches('/'), path);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header("X-APP-Key", &self.credentials.app_key)
            .json(&body)
            .timeout(Duration::from_millis(self.timeout_ms))
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                tracing::warn!(provider = self.provider, path, "provider call timed out");
                return Err(GatewayError::Timeout);
            }
            Err(e) => {
                tracing::warn!(provider = self.provider, path, error = %e, "provider call failed");
                return Err(GatewayError::Network(e.to_string()));
            }
        };

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let parsed: Option<serde_json::Value> = serde_json::from_str(&text).ok();

        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(error_message(parsed.as_ref())));
        }
        if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
            return Err(GatewayError::Timeout);
        }
        if !status.is_success() {
            return Err(GatewayError::Rejected {
                provider: self.provider.to_string(),
                code: error_code(parsed.as_ref()).unwrap_or_else(|| format!("HTTP_{}", status.as_u16())),
                message: error_message(parsed.as_ref()),
            });
        }

        let v = parsed.ok_or_else(|| GatewayError::Decode(text.chars().take(200).collect()))?;
        // Both providers also report business errors inside 200 responses.
        if let Some(code) = error_code(Some(&v)) {
            return Err(GatewayError::Rejected {
                provider: self.provider.to_string(),
                code,
                message: error_message(Some(&v)),
            });
        }
        Ok(v)
    }

    pub fn verify(&self, payload: &str, signature: &str, timestamp: &str) -> bool {
        crate::gateways::signature::verify(&self.credentials.app_secret, payload, signature, timestamp)
    }
}

fn error_code(v: Option<&serde_json::Value>) -> Option<String> {
    v.and_then(|v| v.get("errorCode"))
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(ToString::to_string)
}

fn error_message(v: Option<&serde_json::Value>) -> String {
    v.and_then(|v| v.get("errorMessage").or_else(|| v.get("statusMessage")))
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .unwrap_or("Unknown error")
        .to_string()
}
