use crate::gateways::client::{ProviderClient, ProviderCredentials};
use crate::gateways::{
    validate_checkout, validate_refund, AgreementRequest, CheckoutRequest, GatewayError, GatewayPayment,
    PaymentGateway,
};
use rust_decimal::Decimal;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://checkout.pay.bka.sh/v1.2.0-beta";

/// Tokenized checkout mode.
const MODE: &str = "0011";

pub struct BkashGateway {
    pub http: ProviderClient,
}

impl BkashGateway {
    pub fn new(credentials: ProviderCredentials, timeout_ms: u64) -> Self {
        Self {
            http: ProviderClient::new("bkash", credentials, timeout_ms),
        }
    }

    /// Recurring-payment agreement; the caller later charges it with
    /// [`BkashGateway::execute_agreement_payment`].
    pub async fn create_agreement(&self, request: &AgreementRequest) -> Result<serde_json::Value, GatewayError> {
        if request.amount <= Decimal::ZERO || request.max_amount < request.amount {
            return Err(GatewayError::InvalidAmount(format!(
                "agreement amount {} must be positive and within max {}",
                request.amount, request.max_amount
            )));
        }
        self.http
            .post(
                "/checkout/agreement/create",
                json!({
                    "mode": MODE,
                    "agreementID": request.agreement_id,
                    "amount": request.amount.round_dp(2).to_string(),
                    "frequency": request.frequency,
                    "duration": request.duration,
                    "maxAmount": request.max_amount.round_dp(2).to_string(),
                }),
            )
            .await
    }

    pub async fn execute_agreement_payment(&self, agreement_id: &str) -> Result<GatewayPayment, GatewayError> {
        let v = self
            .http
            .post(
                "/checkout/agreement/execute",
                json!({ "mode": MODE, "agreementID": agreement_id }),
            )
            .await?;
        GatewayPayment::from_provider_json(v)
    }
}

#[async_trait::async_trait]
impl PaymentGateway for BkashGateway {
    fn name(&self) -> &'static str {
        "bkash"
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
                    "mode": MODE,
                    "payerReference": request.payer_reference,
                    "callbackURL": request.callback_url,
                    "amount": request.amount.round_dp(2).to_string(),
                    "currency": request.currency,
                    "intent": request.intent,
                    "merchantInvoiceNumber": request.merchant_invoice_number,
                    "productDetails": request.product_details,
                }),
            )
            .await?;
        GatewayPayment::from_provider_json(v)
    }

    async fn execute_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let v = self
            .http
            .post("/checkout/execute", json!({ "paymentID": payment_id, "mode": MODE }))
            .await?;
        GatewayPayment::from_provider_json(v)
    }

    async fn query_payment_status(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let v = self
            .http
            .post("/checkout/payment/status", json!({ "paymentID": payment_id, "mode": MODE }))
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
                    "paymentID": original_payment_id,
                    "amount": amount.round_dp(2).to_string(),
                    "reason": reason,
                    "mode": MODE,
                }),
            )
            .await?;
        GatewayPayment::from_provider_json(v)
    }

    async fn payment_methods(&self) -> Result<serde_json::Value, GatewayError> {
        self.http
            .post("/checkout/payment/methods", json!({ "mode": MODE }))
            .await
    }

    fn verify_webhook_signature(&self, payload: &str, signature: &str, timestamp: &str) -> bool {
        self.http.verify(payload, signature, timestamp)
    }
}
