use crate::domain::payment::{CreatePaymentRequest, CustomerInfo, Payment, PaymentFilter, PaymentMethod, PaymentSummary};
use crate::error::AppResult;
use crate::gateways::GatewayPayment;
use crate::http::actor::{actor_context, parse_body};
use crate::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::service::payment_service::{PaymentOutcome, RefundRequest};
use crate::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentView {
    #[serde(flatten)]
    summary: PaymentSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkout_url: Option<String>,
}

fn outcome_response(outcome: PaymentOutcome) -> Response {
    let succeeded = outcome.succeeded();
    let view = PaymentView {
        summary: PaymentSummary::from(&outcome.payment),
        checkout_url: outcome.checkout_url,
    };
    if succeeded {
        (StatusCode::OK, Json(json!({ "success": true, "payment": view }))).into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": "Payment processing failed",
                "payment": view,
            })),
        )
            .into_response()
    }
}

fn gateway_view(payment: &Payment, gp: &GatewayPayment) -> serde_json::Value {
    json!({
        "payment": PaymentSummary::from(payment),
        "gatewayPaymentId": gp.payment_id,
        "trxID": gp.transaction_id,
        "gatewayResponse": gp.raw,
    })
}

pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let req: CreatePaymentRequest = parse_body(body)?;
    let outcome = state.payment_service.create_payment(req, &ctx).await?;
    Ok(outcome_response(outcome))
}

pub async fn list_payments(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(filter): ApiQuery<PaymentFilter>,
) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let (payments, pagination) = state.payment_service.list_payments(filter, &ctx).await?;
    Ok(Json(json!({
        "success": true,
        "data": { "payments": payments, "pagination": pagination },
    }))
    .into_response())
}

pub async fn supported_methods(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "success": true, "data": state.payment_service.supported_methods() }))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(payment_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let req: RefundRequest = parse_body(body)?;
    let payment = state.payment_service.refund_payment(payment_id, req, &ctx).await?;
    Ok(Json(json!({ "success": true, "data": payment })).into_response())
}

pub async fn payment_escrow(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(payment_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let escrow = state.payment_service.get_escrow(payment_id, &ctx).await?;
    Ok(Json(json!({ "success": true, "data": escrow, "payout": escrow.payout() })).into_response())
}

pub async fn release_escrow(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(payment_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let escrow = state.payment_service.release_escrow(payment_id, &ctx).await?;
    Ok(Json(json!({ "success": true, "data": escrow, "payout": escrow.payout() })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCheckout {
    pub amount: Decimal,
    pub job_id: Option<Uuid>,
    pub description: Option<String>,
    pub customer_info: Option<CustomerInfo>,
    pub payer_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRef {
    pub payment_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRefund {
    pub payment_id: Uuid,
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

/// Body of the provider-specific endpoints, dispatched on `action`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProviderAction {
    Create(ProviderCheckout),
    Execute(PaymentRef),
    Query(PaymentRef),
    Refund(ProviderRefund),
}

async fn provider_action(state: AppState, method: PaymentMethod, headers: HeaderMap, body: serde_json::Value) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let action: ProviderAction = parse_body(body)?;
    let service = &state.payment_service;

    match action {
        ProviderAction::Create(c) => {
            let req = CreatePaymentRequest {
                amount: c.amount,
                method,
                job_id: c.job_id,
                description: c.description,
                customer_info: c.customer_info,
                payer_reference: c.payer_reference,
            };
            Ok(outcome_response(service.create_payment(req, &ctx).await?))
        }
        ProviderAction::Execute(r) => {
            let (payment, gp) = service.execute_payment(r.payment_id, &ctx).await?;
            Ok(Json(json!({ "success": true, "data": gateway_view(&payment, &gp) })).into_response())
        }
        ProviderAction::Query(r) => {
            let (payment, gp) = service.query_payment(r.payment_id, &ctx).await?;
            Ok(Json(json!({ "success": true, "data": gateway_view(&payment, &gp) })).into_response())
        }
        ProviderAction::Refund(r) => {
            let req = RefundRequest {
                amount: r.amount,
                reason: r.reason,
            };
            let payment = service.refund_payment(r.payment_id, req, &ctx).await?;
            Ok(Json(json!({ "success": true, "data": payment })).into_response())
        }
    }
}

pub async fn bkash_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> AppResult<Response> {
    provider_action(state, PaymentMethod::Bkash, headers, body).await
}

pub async fn nagad_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> AppResult<Response> {
    provider_action(state, PaymentMethod::Nagad, headers, body).await
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
