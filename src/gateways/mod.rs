use crate::domain::payment::PaymentMethod;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod bkash;
pub mod client;
pub mod mock;
pub mod nagad;
pub mod signature;

pub const DEFAULT_CURRENCY: &str = "BDT";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("{provider} rejected the request ({code}): {message}")]
    Rejected {
        provider: String,
        code: String,
        message: String,
    },
    #[error("payment not found at provider: {0}")]
    NotFound(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("{0} gateway is not configured")]
    Disabled(String),
    #[error("gateway timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("undecodable provider response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub product_code: String,
    pub product_type: String,
    pub product_name: String,
    pub product_description: String,
    pub product_category: String,
    pub product_quantity: u32,
    pub product_unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub amount: Decimal,
    pub currency: String,
    pub intent: String,
    pub merchant_invoice_number: Option<String>,
    pub callback_url: Option<String>,
    pub payer_reference: Option<String>,
    pub product_details: Option<ProductDetails>,
}

impl CheckoutRequest {
    pub fn sale(amount: Decimal) -> Self {
        Self {
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            intent: "sale".to_string(),
            merchant_invoice_number: None,
            callback_url: None,
            payer_reference: None,
            product_details: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransactionStatus {
    Initiated,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    Unknown(String),
}

impl TransactionStatus {
    /// Both providers' vocabularies fold into one set.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "initiated" | "pending" | "inprogress" => TransactionStatus::Initiated,
            "completed" | "success" | "successful" => TransactionStatus::Completed,
            "failed" | "failure" | "declined" => TransactionStatus::Failed,
            "cancelled" | "canceled" | "aborted" => TransactionStatus::Cancelled,
            "refunded" => TransactionStatus::Refunded,
            _ => TransactionStatus::Unknown(raw.to_string()),
        }
    }

    /// Provider accepted the payment intent.
    pub fn is_accepted(&self) -> bool {
        matches!(self, TransactionStatus::Initiated | TransactionStatus::Completed)
    }
}

/// Provider response normalized across bKash/Nagad.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPayment {
    pub payment_id: String,
    pub checkout_url: Option<String>,
    pub transaction_status: TransactionStatus,
    pub transaction_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub raw: serde_json::Value,
}

impl GatewayPayment {
    pub fn from_provider_json(v: serde_json::Value) -> Result<Self, GatewayError> {
        let payment_id = str_field(&v, &["paymentID", "paymentId", "originalPaymentID"])
            .ok_or_else(|| GatewayError::Decode("missing paymentID".to_string()))?;
        let status = str_field(&v, &["transactionStatus", "paymentStatus", "status"])
            .map(|s| TransactionStatus::parse(&s))
            .unwrap_or_else(|| TransactionStatus::Unknown(String::new()));
        let amount = match v.get("amount") {
            Some(serde_json::Value::String(s)) => s.parse::<Decimal>().ok(),
            Some(serde_json::Value::Number(n)) => n.to_string().parse::<Decimal>().ok(),
            _ => None,
        };

        Ok(Self {
            payment_id,
            checkout_url: str_field(&v, &["bkashURL", "checkoutURL", "callBackUrl", "redirectURL"]),
            transaction_status: status,
            transaction_id: str_field(&v, &["trxID", "transactionID", "issuerPaymentRefNo"]),
            amount,
            currency: str_field(&v, &["currency"]),
            raw: v,
        })
    }
}

fn str_field(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| v.get(*k))
        .filter_map(|f| f.as_str())
        .find(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementRequest {
    pub agreement_id: String,
    pub amount: Decimal,
    pub frequency: String,
    pub duration: String,
    pub max_amount: Decimal,
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Credentials are present; a gateway that is not valid refuses every call.
    fn is_environment_valid(&self) -> bool;

    async fn generate_checkout_url(&self, request: CheckoutRequest) -> Result<GatewayPayment, GatewayError>;

    async fn execute_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;

    async fn query_payment_status(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;

    async fn process_refund(
        &self,
        original_payment_id: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<GatewayPayment, GatewayError>;

    async fn payment_methods(&self) -> Result<serde_json::Value, GatewayError>;

    fn verify_webhook_signature(&self, payload: &str, signature: &str, timestamp: &str) -> bool;
}

pub fn validate_checkout(provider: &str, request: &CheckoutRequest) -> Result<(), GatewayError> {
    if request.amount <= Decimal::ZERO {
        return Err(GatewayError::InvalidAmount(format!(
            "amount must be positive, got {}",
            request.amount
        )));
    }
    if request.currency != DEFAULT_CURRENCY {
        return Err(GatewayError::Rejected {
            provider: provider.to_string(),
            code: "INVALID_CURRENCY".to_string(),
            message: format!("unsupported currency {}", request.currency),
        });
    }
    Ok(())
}

/// Refunds are bounded by what the provider says was originally paid.
pub fn validate_refund(original: &GatewayPayment, amount: Decimal) -> Result<(), GatewayError> {
    if amount <= Decimal::ZERO {
        return Err(GatewayError::InvalidAmount(format!(
            "refund amount must be positive, got {amount}"
        )));
    }
    if let Some(paid) = original.amount {
        if amount > paid {
            return Err(GatewayError::InvalidAmount(format!(
                "refund amount {amount} exceeds original amount {paid}"
            )));
        }
    }
    Ok(())
}

/// Method → adapter dispatch table, built once at startup.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    adapters: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, method: PaymentMethod, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.adapters.insert(method, gateway);
        self
    }

    pub fn get(&self, method: PaymentMethod) -> Option<Arc<dyn PaymentGateway>> {
        self.adapters.get(&method).cloned()
    }

    pub fn by_provider(&self, provider: &str) -> Option<Arc<dyn PaymentGateway>> {
        self.adapters
            .values()
            .find(|g| g.name().eq_ignore_ascii_case(provider))
            .cloned()
    }

    pub fn supported_methods(&self) -> Vec<PaymentMethod> {
        let mut methods: Vec<PaymentMethod> = self
            .adapters
            .iter()
            .filter(|(_, g)| g.is_environment_valid())
            .map(|(m, _)| *m)
            .collect();
        methods.sort_by_key(|m| m.as_str());
        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_bkash_shape() {
        let p = GatewayPayment::from_provider_json(json!({
            "paymentID": "TR0011abc",
            "transactionStatus": "Completed",
            "trxID": "9ABC123",
            "amount": "1500.00",
            "currency": "BDT",
            "bkashURL": "https://sandbox.bka.sh/checkout?id=TR0011abc"
        }))
        .unwrap();
        assert_eq!(p.transaction_status, TransactionStatus::Completed);
        assert_eq!(p.transaction_id.as_deref(), Some("9ABC123"));
        assert_eq!(p.amount, Some(Decimal::new(150000, 2)));
        assert!(p.checkout_url.is_some());
    }

    #[test]
    fn normalizes_nagad_vocabulary() {
        assert_eq!(TransactionStatus::parse("Success"), TransactionStatus::Completed);
        assert_eq!(TransactionStatus::parse("Pending"), TransactionStatus::Initiated);
        assert!(matches!(TransactionStatus::parse("Weird"), TransactionStatus::Unknown(_)));
    }

    #[test]
    fn missing_payment_id_is_decode_error() {
        let err = GatewayPayment::from_provider_json(json!({"transactionStatus": "Completed"})).unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[test]
    fn refund_cannot_exceed_original() {
        let original = GatewayPayment::from_provider_json(json!({
            "paymentID": "P1", "transactionStatus": "Completed", "amount": 1000
        }))
        .unwrap();
        assert!(validate_refund(&original, Decimal::new(1000, 0)).is_ok());
        assert!(matches!(
            validate_refund(&original, Decimal::new(100001, 2)),
            Err(GatewayError::InvalidAmount(_))
        ));
        assert!(validate_refund(&original, Decimal::ZERO).is_err());
    }

    #[test]
    fn checkout_rejects_foreign_currency() {
        let mut req = CheckoutRequest::sale(Decimal::new(500, 0));
        req.currency = "USD".to_string();
        assert!(matches!(
            validate_checkout("bkash", &req),
            Err(GatewayError::Rejected { code, .. }) if code == "INVALID_CURRENCY"
        ));
    }
}
