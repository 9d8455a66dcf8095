use crate::gateways::client::{ProviderClient, ProviderCredentials};
use crate::gateways::{
    validate_checkout, validate_refund, CheckoutRequest, GatewayError, GatewayPayment, PaymentGateway,
};
use rust_decimal::Decimal;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://api.mynagad.com/v2/checkout";

pub struct NagadGateway {
    pub http: ProviderClient,
}

impl NagadGateway {
    pub fn new(credentials: ProviderCredentials, timeout_ms: u64) -> Self {
        Self {
            http: ProviderClient::new("nagad", credentials, timeout_ms),
        }
    }
}

fn challenge() -> serde_json::Value {
    json!({ "challenge": "Nagad", "challengeType": "0000" })
}

#[async_trait::async_trait]
impl PaymentGateway for NagadGateway {
    fn name(&self) -> &'static str {
        "nagad"
    }

    fn is_environment_valid(&self) -> bool {
        self.http.credentials.is_complete()
    }

    async fn generate_checkout_url(&self, request: CheckoutRequest) -> Result<GatewayPayment, GatewayError> {
        validate_checkout(self.name(), &request)?;
        let v = self
            .http
            .post(
                "/checkout/create",
                json!({
                    "amount": request.amount.round_dp(2).to_string(),
                    "currency": request.currency,
                    "intent": request.intent,
                    "merchantInvoiceNumber": request.merchant_invoice_number,
                    "callbackURL": request.callback_url,
                    "payerReference": request.payer_reference,
                    "productDetails": request.product_details,
                }),
            )
            .await?;
        GatewayPayment::from_provider_json(v)
    }

    async fn execute_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let v = self
            .http
            .post(
                "/checkout/execute",
                json!({ "paymentID": payment_id, "additionalData": challenge() }),
            )
            .await?;
        GatewayPayment::from_provider_json(v)
    }

    async fn query_payment_status(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let v = self
            .http
            .post(
                "/checkout/payment/status",
                json!({ "paymentID": payment_id, "additionalData": challenge() }),
            )
            .await?;
        GatewayPayment::from_provider_json(v)
    }

    async fn process_refund(
        &self,
        original_payment_id: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        let original = self.query_payment_status(original_payment_id).await?;
        validate_refund(&original, amount)?;

        let v = self
            .http
            .post(
                "/checkout/payment/refund",
                json!({
                    "originalPaymentID": original_payment_id,
                    "amount": amount.round_dp(2).to_string(),
                    "reason": reason,
                    "additionalData": challenge(),
                }),
            )
            .await?;
        GatewayPayment::from_provider_json(v)
    }

    async fn payment_methods(&self) -> Result<serde_json::Value, GatewayError> {
        self.http
            .post("/checkout/payment/methods", json!({ "additionalData": challenge() }))
            .await
    }

    fn verify_webhook_signature(&self, payload: &str, signature: &str, timestamp: &str) -> bool {
        self.http.verify(payload, signature, timestamp)
    }
}
