use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use carenet_payments::gateways::bkash::BkashGateway;
use carenet_payments::gateways::client::ProviderCredentials;
use carenet_payments::gateways::nagad::NagadGateway;
use carenet_payments::gateways::{
    AgreementRequest, CheckoutRequest, GatewayError, PaymentGateway, ProductDetails, TransactionStatus,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Seen = Arc<Mutex<Vec<(String, Value)>>>;

async fn provider_stub(State(seen): State<Seen>, uri: Uri, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let path = uri.path().to_string();
    seen.lock().unwrap().push((path.clone(), body.clone()));

    if headers.get("x-app-key").and_then(|v| v.to_str().ok()) != Some("app-key") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "errorCode": "2001", "errorMessage": "Invalid App Key" })))
            .into_response();
    }

    let payment_id = body["paymentID"]
        .as_str()
        .or_else(|| body["originalPaymentID"].as_str())
        .unwrap_or("")
        .to_string();

    match path.as_str() {
        "/checkout/create" => match body["payerReference"].as_str().unwrap_or("") {
            "decline" => Json(json!({ "errorCode": "2023", "errorMessage": "Insufficient Balance" })).into_response(),
            "boom" => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "errorCode": "9999", "errorMessage": "System is undergoing maintenance" })),
            )
                .into_response(),
            "slow" => {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                Json(json!({ "paymentID": "TR_SLOW", "transactionStatus": "Initiated" })).into_response()
            }
            "garbage" => (StatusCode::OK, "<html>upstream proxy error</html>").into_response(),
            _ => Json(json!({
                "paymentID": "TR0011XYZ",
                "transactionStatus": "Initiated",
                "amount": body["amount"],
                "currency": "BDT",
                "bkashURL": "https://sandbox.payment.bkash.com/?paymentId=TR0011XYZ",
            }))
            .into_response(),
        },
        "/checkout/payment/status" if payment_id == "missing" => {
            (StatusCode::NOT_FOUND, Json(json!({ "errorMessage": "Payment not found" }))).into_response()
        }
        "/checkout/payment/status" | "/checkout/execute" => Json(json!({
            "paymentID": payment_id,
            "transactionStatus": "Completed",
            "amount": "1000.00",
            "trxID": "BGH5KL9Q2",
        }))
        .into_response(),
        "/checkout/payment/refund" => Json(json!({
            "originalPaymentID": payment_id,
            "transactionStatus": "Refunded",
            "amount": body["amount"],
            "refundTrxID": "RFD123",
        }))
        .into_response(),
        "/checkout/agreement/create" => Json(json!({
            "agreementID": body["agreementID"],
            "agreementStatus": "Initiated",
            "bkashURL": "https://sandbox.payment.bkash.com/?agreementId=AGR1",
        }))
        .into_response(),
        "/checkout/agreement/execute" => Json(json!({
            "paymentID": "TR_AGR",
            "agreementID": body["agreementID"],
            "transactionStatus": "Completed",
            "trxID": "AGRTRX1",
        }))
        .into_response(),
        "/checkout/payment/methods" => Json(json!({ "methods": ["WALLET", "CARD"] })).into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
    }
}

async fn spawn_stub() -> (String, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new().fallback(provider_stub).with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn credentials(base_url: &str, app_key: &str) -> ProviderCredentials {
    ProviderCredentials {
        username: "sandboxTokenizedUser02".to_string(),
        password: "sandboxTokenizedUser02@12345".to_string(),
        app_key: app_key.to_string(),
        app_secret: "app-secret".to_string(),
        base_url: base_url.to_string(),
    }
}

fn checkout(payer_reference: &str) -> CheckoutRequest {
    let mut req = CheckoutRequest::sale(dec!(1000));
    req.payer_reference = Some(payer_reference.to_string());
    req.merchant_invoice_number = Some("INV-1760688000000-AB12CD34E".to_string());
    req
}

#[tokio::test]
async fn bkash_checkout_is_accepted() {
    let (base, seen) = spawn_stub().await;
    let gw = BkashGateway::new(credentials(&base, "app-key"), 1000);

    let p = gw.generate_checkout_url(checkout("01770618575")).await.unwrap();
    assert_eq!(p.payment_id, "TR0011XYZ");
    assert_eq!(p.transaction_status, TransactionStatus::Initiated);
    assert!(p.transaction_status.is_accepted());
    assert!(p.checkout_url.unwrap().contains("TR0011XYZ"));

    let seen = seen.lock().unwrap();
    let (path, body) = &seen[0];
    assert_eq!(path, "/checkout/create");
    assert_eq!(body["mode"], "0011");
    assert_eq!(body["amount"], "1000");
    assert_eq!(body["intent"], "sale");
    assert_eq!(body["merchantInvoiceNumber"], "INV-1760688000000-AB12CD34E");
}

#[tokio::test]
async fn business_error_in_ok_response_is_rejection() {
    let (base, _) = spawn_stub().await;
    let gw = BkashGateway::new(credentials(&base, "app-key"), 1000);

    let err = gw.generate_checkout_url(checkout("decline")).await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::Rejected {
            provider: "bkash".to_string(),
            code: "2023".to_string(),
            message: "Insufficient Balance".to_string(),
        }
    );
}

#[tokio::test]
async fn http_errors_map_to_taxonomy() {
    let (base, _) = spawn_stub().await;
    let gw = BkashGateway::new(credentials(&base, "app-key"), 1000);

    let err = gw.generate_checkout_url(checkout("boom")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Rejected { ref code, .. } if code == "9999"));

    let err = gw.query_payment_status("missing").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));

    let err = gw.generate_checkout_url(checkout("garbage")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)));

    let bad_key = BkashGateway::new(credentials(&base, "wrong"), 1000);
    let err = bad_key.generate_checkout_url(checkout("01770618575")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Rejected { ref code, .. } if code == "2001"));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let (base, _) = spawn_stub().await;
    let gw = BkashGateway::new(credentials(&base, "app-key"), 200);
    let err = gw.generate_checkout_url(checkout("slow")).await.unwrap_err();
    assert_eq!(err, GatewayError::Timeout);
}

#[tokio::test]
async fn unreachable_provider_is_network_error() {
    let gw = BkashGateway::new(credentials("http://127.0.0.1:9", "app-key"), 1000);
    let err = gw.execute_payment("TR1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)));
}

#[tokio::test]
async fn missing_credentials_disable_gateway() {
    let mut creds = credentials("http://127.0.0.1:9", "app-key");
    creds.app_secret.clear();
    let gw = NagadGateway::new(creds, 1000);
    assert!(!gw.is_environment_valid());
    let err = gw.generate_checkout_url(checkout("01770618575")).await.unwrap_err();
    assert_eq!(err, GatewayError::Disabled("nagad".to_string()));
}

#[tokio::test]
async fn refund_checks_original_then_calls_provider() {
    let (base, seen) = spawn_stub().await;
    let gw = NagadGateway::new(credentials(&base, "app-key"), 1000);

    let err = gw.process_refund("NG77", dec!(1500), "overcharge").await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidAmount(_)));

    let refund = gw.process_refund("NG77", dec!(250.5), "partial service").await.unwrap();
    assert_eq!(refund.payment_id, "NG77");
    assert_eq!(refund.transaction_status, TransactionStatus::Refunded);

    let seen = seen.lock().unwrap();
    let (path, body) = seen.last().unwrap();
    assert_eq!(path, "/checkout/payment/refund");
    assert_eq!(body["originalPaymentID"], "NG77");
    assert_eq!(body["amount"], "250.5");
    assert_eq!(body["additionalData"]["challenge"], "Nagad");
}

#[tokio::test]
async fn webhook_signature_uses_app_secret() {
    let gw = BkashGateway::new(credentials("http://127.0.0.1:9", "app-key"), 1000);
    let body = r#"{"paymentID":"TR1","transactionStatus":"Completed"}"#;
    let sig = carenet_payments::gateways::signature::sign("app-secret", body, "1760688000");
    assert!(gw.verify_webhook_signature(body, &sig, "1760688000"));
    assert!(!gw.verify_webhook_signature(body, &sig, "1760688001"));
}

#[tokio::test]
async fn checkout_forwards_product_details() {
    let (base, seen) = spawn_stub().await;
    let gw = BkashGateway::new(credentials(&base, "app-key"), 1000);

    let mut req = checkout("01770618575");
    req.product_details = Some(ProductDetails {
        product_code: "CARE-8H".to_string(),
        product_type: "SERVICE".to_string(),
        product_name: "Night shift".to_string(),
        product_description: "Eight hour caregiver shift".to_string(),
        product_category: "HOME_CARE".to_string(),
        product_quantity: 1,
        product_unit_price: dec!(1000),
    });
    gw.generate_checkout_url(req).await.unwrap();

    let seen = seen.lock().unwrap();
    let (_, body) = &seen[0];
    assert_eq!(body["productDetails"]["productCode"], "CARE-8H");
    assert_eq!(body["productDetails"]["productQuantity"], 1);
}

#[tokio::test]
async fn bkash_agreement_flow() {
    let (base, seen) = spawn_stub().await;
    let gw = BkashGateway::new(credentials(&base, "app-key"), 1000);

    let bad = AgreementRequest {
        agreement_id: "AGR1".to_string(),
        amount: dec!(500),
        frequency: "MONTHLY".to_string(),
        duration: "12".to_string(),
        max_amount: dec!(400),
    };
    let err = gw.create_agreement(&bad).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidAmount(_)));
    assert!(seen.lock().unwrap().is_empty());

    let request = AgreementRequest {
        max_amount: dec!(1000),
        ..bad
    };
    let created = gw.create_agreement(&request).await.unwrap();
    assert_eq!(created["agreementID"], "AGR1");

    let charged = gw.execute_agreement_payment("AGR1").await.unwrap();
    assert_eq!(charged.payment_id, "TR_AGR");
    assert_eq!(charged.transaction_status, TransactionStatus::Completed);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "/checkout/agreement/create");
    assert_eq!(seen[0].1["maxAmount"], "1000");
    assert_eq!(seen[1].0, "/checkout/agreement/execute");
    assert_eq!(seen[1].1["mode"], "0011");
}

#[tokio::test]
async fn payment_methods_are_passed_through() {
    let (base, _) = spawn_stub().await;
    let gw = BkashGateway::new(credentials(&base, "app-key"), 1000);
    let methods = gw.payment_methods().await.unwrap();
    assert_eq!(methods["methods"][0], "WALLET");
}
