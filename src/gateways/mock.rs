use crate::gateways::{
    validate_checkout, validate_refund, CheckoutRequest, GatewayError, GatewayPayment, PaymentGateway,
    TransactionStatus,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process gateway for local runs and tests. `behavior` is one of
/// `ALWAYS_SUCCESS` (default), `ALWAYS_INITIATED`, `ALWAYS_FAILURE`,
/// `ALWAYS_TIMEOUT`, `ALWAYS_ERROR`.
pub struct MockGateway {
    pub behavior: String,
    pub secret: String,
    issued: Mutex<HashMap<String, Decimal>>,
}

impl MockGateway {
    pub fn new(behavior: &str, secret: &str) -> Self {
        Self {
            behavior: behavior.to_string(),
            secret: secret.to_string(),
            issued: Mutex::new(HashMap::new()),
        }
    }

    fn failure(&self) -> Option<GatewayError> {
        match self.behavior.as_str() {
            "ALWAYS_TIMEOUT" => Some(GatewayError::Timeout),
            "ALWAYS_ERROR" => Some(GatewayError::Network("mock connection reset".to_string())),
            _ => None,
        }
    }

    fn payment(&self, payment_id: &str, status: TransactionStatus, amount: Option<Decimal>) -> GatewayPayment {
        let transaction_id = matches!(status, TransactionStatus::Completed | TransactionStatus::Refunded)
            .then(|| format!("mock_txn_{}", uuid::Uuid::new_v4().simple()));
        GatewayPayment {
            payment_id: payment_id.to_string(),
            checkout_url: Some(format!("https://mock.gateway.local/checkout/{payment_id}")),
            transaction_id,
            amount,
            currency: Some("BDT".to_string()),
            raw: json!({
                "paymentID": payment_id,
                "transactionStatus": format!("{status:?}"),
                "amount": amount.map(|a| a.to_string()),
            }),
            transaction_status: status,
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_environment_valid(&self) -> bool {
        true
    }

    async fn generate_checkout_url(&self, request: CheckoutRequest) -> Result<GatewayPayment, GatewayError> {
        validate_checkout(self.name(), &request)?;
        if let Some(err) = self.failure() {
            return Err(err);
        }

        let payment_id = format!("mock_{}", uuid::Uuid::new_v4().simple());
        let status = match self.behavior.as_str() {
            "ALWAYS_FAILURE" => TransactionStatus::Failed,
            "ALWAYS_INITIATED" => TransactionStatus::Initiated,
            _ => TransactionStatus::Completed,
        };
        if status.is_accepted() {
            if let Ok(mut issued) = self.issued.lock() {
                issued.insert(payment_id.clone(), request.amount);
            }
        }
        Ok(self.payment(&payment_id, status, Some(request.amount)))
    }

    async fn execute_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let amount = self.query_payment_status(payment_id).await?.amount;
        Ok(self.payment(payment_id, TransactionStatus::Completed, amount))
    }

    async fn query_payment_status(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        if let Some(err) = self.failure() {
            return Err(err);
        }
        let amount = self
            .issued
            .lock()
            .ok()
            .and_then(|issued| issued.get(payment_id).copied())
            .ok_or_else(|| GatewayError::NotFound(payment_id.to_string()))?;
        Ok(self.payment(payment_id, TransactionStatus::Completed, Some(amount)))
    }

    async fn process_refund(
        &self,
        original_payment_id: &str,
        amount: Decimal,
        _reason: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        let original = self.query_payment_status(original_payment_id).await?;
        validate_refund(&original, amount)?;
        Ok(self.payment(original_payment_id, TransactionStatus::Refunded, Some(amount)))
    }

    async fn payment_methods(&self) -> Result<serde_json::Value, GatewayError> {
        Ok(json!({ "methods": ["MOCK_WALLET"] }))
    }

    fn verify_webhook_signature(&self, payload: &str, signature: &str, timestamp: &str) -> bool {
        crate::gateways::signature::verify(&self.secret, payload, signature, timestamp)
    }
}
