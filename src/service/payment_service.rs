use crate::domain::audit::{AuditLogEntry, ENTITY_PAYMENT};
use crate::domain::context::RequestContext;
use crate::domain::escrow::{Escrow, EscrowStatus};
use crate::domain::payment::{
    CreatePaymentRequest, Pagination, Payment, PaymentFilter, PaymentMethod, PaymentStatus, PaymentUpdate,
};
use crate::domain::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::gateways::{CheckoutRequest, GatewayError, GatewayPayment, GatewayRegistry, PaymentGateway, TransactionStatus};
use crate::repo::PaymentStore;
use crate::service::{require_role, ADMIN_ROLES};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

const PAYER_ROLES: &[UserRole] = &[UserRole::SuperAdmin, UserRole::Moderator, UserRole::Guardian];
const VIEWER_ROLES: &[UserRole] = &[
    UserRole::SuperAdmin,
    UserRole::Moderator,
    UserRole::Company,
    UserRole::Guardian,
];

#[derive(Clone)]
pub struct PaymentService {
    pub payments: Arc<dyn PaymentStore>,
    pub gateways: GatewayRegistry,
    pub callback_url: Option<String>,
}

/// Result of a create call once the record exists. `failure` carries the
/// internal reason for a FAILED payment; it is logged, never returned to callers.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub checkout_url: Option<String>,
    pub failure: Option<String>,
}

impl PaymentOutcome {
    pub fn succeeded(&self) -> bool {
        self.payment.status == PaymentStatus::Completed
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
    pub changed: bool,
}

impl PaymentService {
    pub fn new(payments: Arc<dyn PaymentStore>, gateways: GatewayRegistry) -> Self {
        Self {
            payments,
            gateways,
            callback_url: None,
        }
    }

    pub fn with_callback_url(mut self, url: Option<String>) -> Self {
        self.callback_url = url;
        self
    }

    pub fn supported_methods(&self) -> Vec<PaymentMethod> {
        self.gateways.supported_methods()
    }

    pub async fn ping(&self) -> AppResult<()> {
        Ok(self.payments.ping().await?)
    }

    fn gateway_for(&self, method: PaymentMethod) -> AppResult<Arc<dyn PaymentGateway>> {
        self.gateways
            .get(method)
            .ok_or_else(|| AppError::validation(format!("Unsupported payment method: {method}")))
    }

    /// PENDING is persisted first, then resolved to COMPLETED or FAILED before
    /// returning. Gateway failures after persistence come back as a FAILED outcome.
    pub async fn create_payment(&self, req: CreatePaymentRequest, ctx: &RequestContext) -> AppResult<PaymentOutcome> {
        require_role(ctx, PAYER_ROLES)?;
        validate_create(&req)?;
        let gateway = self.gateway_for(req.method)?;

        let payment = Payment::new_pending(ctx.actor_id, req.job_id, req.amount, req.method);
        let escrow = Escrow::held_for(&payment);
        self.payments.insert(&payment, &escrow).await?;
        tracing::info!(
            payment_id = %payment.id,
            fee = %escrow.fee,
            method = %payment.method,
            amount = %payment.amount,
            "payment created"
        );

        let mut checkout = CheckoutRequest::sale(req.amount);
        checkout.merchant_invoice_number = Some(payment.invoice_number.clone());
        checkout.callback_url = self.callback_url.clone();
        checkout.payer_reference = req
            .payer_reference
            .clone()
            .or_else(|| req.customer_info.as_ref().and_then(|c| c.phone.clone()));

        let (to, update, checkout_url, failure) = match gateway.generate_checkout_url(checkout).await {
            Ok(gp) if gp.transaction_status.is_accepted() => (
                PaymentStatus::Completed,
                PaymentUpdate {
                    gateway_payment_id: Some(gp.payment_id.clone()),
                    gateway_response: Some(gp.raw.clone()),
                    paid_at: Some(Utc::now()),
                    ..Default::default()
                },
                gp.checkout_url.clone(),
                None,
            ),
            Ok(gp) => (
                PaymentStatus::Failed,
                PaymentUpdate {
                    gateway_payment_id: Some(gp.payment_id.clone()),
                    gateway_response: Some(gp.raw.clone()),
                    ..Default::default()
                },
                None,
                Some(format!(
                    "{} declined payment {}: {:?}",
                    gateway.name(),
                    gp.payment_id,
                    gp.transaction_status
                )),
            ),
            Err(err) => (
                PaymentStatus::Failed,
                PaymentUpdate {
                    gateway_response: Some(json!({ "error": err.to_string() })),
                    ..Default::default()
                },
                None,
                Some(format!("{} call failed: {err}", gateway.name())),
            ),
        };

        let audit = AuditLogEntry::new(
            ctx,
            audit_action(to),
            ENTITY_PAYMENT,
            payment.id,
            Some(json!({
                "from": PaymentStatus::Pending,
                "to": to,
                "method": payment.method,
                "amount": payment.amount,
                "gateway": gateway.name(),
                "invoiceNumber": payment.invoice_number,
            })),
        );
        let resolved = self
            .payments
            .transition(payment.id, PaymentStatus::Pending, to, update, audit)
            .await?
            .ok_or_else(|| AppError::InvalidState(format!("payment {} was resolved concurrently", payment.id)))?;

        match &failure {
            Some(reason) => tracing::error!(payment_id = %resolved.id, %reason, "payment failed"),
            None => tracing::info!(payment_id = %resolved.id, "payment completed"),
        }

        Ok(PaymentOutcome {
            payment: resolved,
            checkout_url,
            failure,
        })
    }

    pub async fn get_payment(&self, payment_id: Uuid, ctx: &RequestContext) -> AppResult<Payment> {
        require_role(ctx, VIEWER_ROLES)?;
        let payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
        if !ctx.actor_role.is_admin() && payment.payer_id != ctx.actor_id {
            return Err(AppError::Authorization("payment belongs to another payer".to_string()));
        }
        Ok(payment)
    }

    /// COMPLETED → REFUNDED. Any other starting status is rejected untouched.
    pub async fn refund_payment(
        &self,
        payment_id: Uuid,
        req: RefundRequest,
        ctx: &RequestContext,
    ) -> AppResult<Payment> {
        require_role(ctx, ADMIN_ROLES)?;
        let reason = req
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| AppError::validation("Missing required fields: reason"))?
            .to_string();

        let payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
        if !payment.status.can_transition_to(PaymentStatus::Refunded) {
            return Err(AppError::InvalidState(format!(
                "Only completed payments can be refunded (status is {})",
                payment.status
            )));
        }

        if self
            .payments
            .escrow_for(payment.id)
            .await?
            .is_some_and(|e| e.status == EscrowStatus::Released)
        {
            return Err(AppError::InvalidState(
                "Escrow was already released to the provider".to_string(),
            ));
        }

        let amount = req.amount.unwrap_or(payment.amount);
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount("Refund amount must be positive".to_string()));
        }
        if amount > payment.amount {
            return Err(AppError::InvalidAmount(format!(
                "Refund amount {amount} exceeds payment amount {}",
                payment.amount
            )));
        }

        let gateway = self.gateway_for(payment.method)?;
        let reference = payment
            .gateway_payment_id
            .clone()
            .ok_or_else(|| AppError::InvalidState("Payment has no gateway reference".to_string()))?;
        let refund = gateway
            .process_refund(&reference, amount, &reason)
            .await
            .map_err(map_gateway_error)?;

        let audit = AuditLogEntry::new(
            ctx,
            audit_action(PaymentStatus::Refunded),
            ENTITY_PAYMENT,
            payment.id,
            Some(json!({
                "from": PaymentStatus::Completed,
                "to": PaymentStatus::Refunded,
                "amount": amount,
                "reason": reason,
                "refundTransactionId": refund.transaction_id,
            })),
        );
        let update = PaymentUpdate {
            gateway_response: Some(refund.raw),
            refund_amount: Some(amount),
            refund_reason: Some(reason),
            ..Default::default()
        };
        let refunded = self
            .payments
            .transition(payment.id, PaymentStatus::Completed, PaymentStatus::Refunded, update, audit)
            .await?
            .ok_or_else(|| AppError::InvalidState("Payment was refunded concurrently".to_string()))?;

        tracing::info!(payment_id = %refunded.id, %amount, "payment refunded");
        Ok(refunded)
    }

    /// Escrow of a payment the caller may see.
    pub async fn get_escrow(&self, payment_id: Uuid, ctx: &RequestContext) -> AppResult<Escrow> {
        let payment = self.get_payment(payment_id, ctx).await?;
        self.payments
            .escrow_for(payment.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Escrow not found".to_string()))
    }

    /// HELD → RELEASED once the job is done. Only completed payments pay out.
    pub async fn release_escrow(&self, payment_id: Uuid, ctx: &RequestContext) -> AppResult<Escrow> {
        require_role(ctx, ADMIN_ROLES)?;
        let payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
        if payment.status != PaymentStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "Escrow can only be released for completed payments (status is {})",
                payment.status
            )));
        }
        let escrow = self
            .payments
            .escrow_for(payment.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Escrow not found".to_string()))?;
        if escrow.status != EscrowStatus::Held {
            return Err(AppError::InvalidState("Escrow was already released".to_string()));
        }

        let audit = AuditLogEntry::new(
            ctx,
            "ESCROW_RELEASED",
            ENTITY_PAYMENT,
            payment.id,
            Some(json!({
                "escrowId": escrow.id,
                "amount": escrow.amount,
                "fee": escrow.fee,
                "payout": escrow.payout(),
            })),
        );
        let released = self
            .payments
            .release_escrow(payment.id, audit)
            .await?
            .ok_or_else(|| AppError::InvalidState("Escrow was released concurrently".to_string()))?;

        tracing::info!(payment_id = %payment.id, payout = %released.payout(), "escrow released");
        Ok(released)
    }

    /// Confirms the provider checkout. A still-PENDING record is resolved from the answer.
    pub async fn execute_payment(&self, payment_id: Uuid, ctx: &RequestContext) -> AppResult<(Payment, GatewayPayment)> {
        let payment = self.get_payment(payment_id, ctx).await?;
        let (gateway, reference) = self.provider_reference(&payment)?;
        let gp = gateway.execute_payment(&reference).await.map_err(map_gateway_error)?;
        let payment = self.resolve_pending(payment, &gp, ctx).await?;
        Ok((payment, gp))
    }

    pub async fn query_payment(&self, payment_id: Uuid, ctx: &RequestContext) -> AppResult<(Payment, GatewayPayment)> {
        let payment = self.get_payment(payment_id, ctx).await?;
        let (gateway, reference) = self.provider_reference(&payment)?;
        let gp = gateway
            .query_payment_status(&reference)
            .await
            .map_err(map_gateway_error)?;
        Ok((payment, gp))
    }

    fn provider_reference(&self, payment: &Payment) -> AppResult<(Arc<dyn PaymentGateway>, String)> {
        let gateway = self.gateway_for(payment.method)?;
        let reference = payment
            .gateway_payment_id
            .clone()
            .ok_or_else(|| AppError::InvalidState("Payment has no gateway reference".to_string()))?;
        Ok((gateway, reference))
    }

    /// Authenticated provider callback. Only PENDING payments move; final ones are acknowledged as-is.
    pub async fn handle_webhook(
        &self,
        provider: &str,
        body: &str,
        signature: &str,
        timestamp: &str,
        ctx: &RequestContext,
    ) -> AppResult<WebhookAck> {
        let gateway = self
            .gateways
            .by_provider(provider)
            .ok_or_else(|| AppError::NotFound(format!("Unknown payment provider: {provider}")))?;

        if !gateway.verify_webhook_signature(body, signature, timestamp) {
            tracing::warn!(provider, ip = %ctx.ip_address, "webhook signature rejected");
            return Err(AppError::Unauthenticated("Invalid webhook signature".to_string()));
        }

        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| AppError::validation(format!("Invalid webhook payload: {e}")))?;
        let gp = GatewayPayment::from_provider_json(value)
            .map_err(|e| AppError::validation(format!("Invalid webhook payload: {e}")))?;

        let mut payment = self.payments.find_by_reference(&gp.payment_id).await?;
        if payment.is_none() {
            if let Some(invoice) = gp.raw.get("merchantInvoiceNumber").and_then(|v| v.as_str()) {
                payment = self.payments.find_by_reference(invoice).await?;
            }
        }
        let payment = payment.ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
        // A provider may only settle payments that were routed through it.
        if !self.gateways.get(payment.method).is_some_and(|g| g.name() == gateway.name()) {
            tracing::warn!(provider, payment_id = %payment.id, method = %payment.method, "webhook for another provider's payment");
            return Err(AppError::NotFound("Payment not found".to_string()));
        }

        let before = payment.status;
        let payment = self.resolve_pending(payment, &gp, ctx).await?;
        tracing::info!(
            provider,
            payment_id = %payment.id,
            gateway_status = ?gp.transaction_status,
            status = %payment.status,
            "webhook processed"
        );

        Ok(WebhookAck {
            payment_id: payment.id,
            status: payment.status,
            changed: before != payment.status,
        })
    }

    async fn resolve_pending(&self, payment: Payment, gp: &GatewayPayment, ctx: &RequestContext) -> AppResult<Payment> {
        if payment.status.is_final() {
            return Ok(payment);
        }
        let to = match gp.transaction_status {
            TransactionStatus::Completed => PaymentStatus::Completed,
            TransactionStatus::Failed | TransactionStatus::Cancelled => PaymentStatus::Failed,
            _ => return Ok(payment),
        };

        let update = PaymentUpdate {
            gateway_payment_id: Some(gp.payment_id.clone()),
            gateway_response: Some(gp.raw.clone()),
            paid_at: (to == PaymentStatus::Completed).then(Utc::now),
            ..Default::default()
        };
        let audit = AuditLogEntry::new(
            ctx,
            audit_action(to),
            ENTITY_PAYMENT,
            payment.id,
            Some(json!({
                "from": PaymentStatus::Pending,
                "to": to,
                "gatewayPaymentId": gp.payment_id,
                "trxID": gp.transaction_id,
            })),
        );

        match self
            .payments
            .transition(payment.id, PaymentStatus::Pending, to, update, audit)
            .await?
        {
            Some(updated) => Ok(updated),
            // Someone else resolved it first; report the current state.
            None => self
                .payments
                .get(payment.id)
                .await?
                .ok_or_else(|| AppError::NotFound("Payment not found".to_string())),
        }
    }

    pub async fn list_payments(&self, mut filter: PaymentFilter, ctx: &RequestContext) -> AppResult<(Vec<Payment>, Pagination)> {
        require_role(ctx, VIEWER_ROLES)?;
        if !ctx.actor_role.is_admin() {
            filter.payer_id = Some(ctx.actor_id);
        }
        let (items, total) = self.payments.list(&filter).await?;
        Ok((items, Pagination::new(filter.page(), filter.limit(), total)))
    }
}

fn validate_create(req: &CreatePaymentRequest) -> AppResult<()> {
    if req.amount <= Decimal::ZERO {
        return Err(AppError::validation_with(
            "Validation failed",
            json!([{ "field": "amount", "message": "Amount must be greater than 0" }]),
        ));
    }
    Ok(())
}

fn audit_action(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Completed => "PAYMENT_COMPLETED",
        PaymentStatus::Failed => "PAYMENT_FAILED",
        PaymentStatus::Refunded => "PAYMENT_REFUNDED",
        PaymentStatus::Frozen => "PAYMENT_FROZEN",
        PaymentStatus::Pending => "PAYMENT_CREATED",
    }
}

fn map_gateway_error(err: GatewayError) -> AppError {
    match err {
        GatewayError::InvalidAmount(msg) => AppError::InvalidAmount(msg),
        GatewayError::NotFound(reference) => AppError::NotFound(format!("Payment {reference} not found at provider")),
        other => AppError::Gateway(other),
    }
}
