use carenet_payments::domain::context::RequestContext;
use carenet_payments::domain::escrow::EscrowStatus;
use carenet_payments::domain::payment::{CreatePaymentRequest, PaymentFilter, PaymentMethod, PaymentStatus};
use carenet_payments::domain::user::UserRole;
use carenet_payments::error::AppError;
use carenet_payments::gateways::mock::MockGateway;
use carenet_payments::gateways::GatewayRegistry;
use carenet_payments::repo::memory::MemoryStore;
use carenet_payments::repo::PaymentStore;
use carenet_payments::service::payment_service::{PaymentService, RefundRequest};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

fn service(store: &MemoryStore, behavior: &str) -> PaymentService {
    let registry = GatewayRegistry::new().register(PaymentMethod::Bkash, Arc::new(MockGateway::new(behavior, "whsec")));
    PaymentService::new(Arc::new(store.clone()), registry)
}

fn guardian() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), UserRole::Guardian)
}

fn admin() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), UserRole::SuperAdmin)
}

fn bkash(amount: Decimal) -> CreatePaymentRequest {
    CreatePaymentRequest {
        amount,
        method: PaymentMethod::Bkash,
        job_id: Some(Uuid::new_v4()),
        description: Some("Night shift, 12h".to_string()),
        customer_info: None,
        payer_reference: Some("01712345678".to_string()),
    }
}

#[tokio::test]
async fn successful_gateway_completes_payment() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");

    let outcome = svc.create_payment(bkash(dec!(1000)), &guardian()).await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.payment.status, PaymentStatus::Completed);
    assert!(outcome.payment.paid_at.is_some());
    assert!(outcome.payment.gateway_payment_id.is_some());
    assert!(outcome.failure.is_none());

    let audit = store.audit_entries().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action_type, "PAYMENT_COMPLETED");
    assert_eq!(audit[0].entity_id, outcome.payment.id);
}

#[tokio::test]
async fn gateway_error_leaves_failed_record() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_TIMEOUT");

    let outcome = svc.create_payment(bkash(dec!(1000)), &guardian()).await.unwrap();
    assert!(!outcome.succeeded());
    assert_eq!(outcome.payment.status, PaymentStatus::Failed);
    assert!(outcome.failure.as_deref().unwrap_or("").contains("timeout"));

    let stored = PaymentStore::get(&store, outcome.payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    let audit = store.audit_entries().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action_type, "PAYMENT_FAILED");
}

#[tokio::test]
async fn declined_checkout_is_failed() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_FAILURE");
    let outcome = svc.create_payment(bkash(dec!(250.50)), &guardian()).await.unwrap();
    assert_eq!(outcome.payment.status, PaymentStatus::Failed);
}

#[tokio::test]
async fn non_positive_amount_persists_nothing() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");

    for amount in [Decimal::ZERO, dec!(-5)] {
        let err = svc.create_payment(bkash(amount), &guardian()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
    assert_eq!(store.payment_count().await, 0);
    assert!(store.audit_entries().await.is_empty());
}

#[tokio::test]
async fn unconfigured_method_is_rejected_before_persisting() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    let mut req = bkash(dec!(100));
    req.method = PaymentMethod::Nagad;

    let err = svc.create_payment(req, &guardian()).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    assert_eq!(store.payment_count().await, 0);
}

#[tokio::test]
async fn caregivers_cannot_pay() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    let ctx = RequestContext::new(Uuid::new_v4(), UserRole::Caregiver);
    let err = svc.create_payment(bkash(dec!(100)), &ctx).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
}

#[tokio::test]
async fn refund_moves_completed_to_refunded() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    let outcome = svc.create_payment(bkash(dec!(1000)), &guardian()).await.unwrap();

    let refunded = svc
        .refund_payment(
            outcome.payment.id,
            RefundRequest {
                amount: Some(dec!(400)),
                reason: Some("Caregiver left early".to_string()),
            },
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(refunded.refund_amount, Some(dec!(400)));

    let actions: Vec<String> = store.audit_entries().await.into_iter().map(|e| e.action_type).collect();
    assert_eq!(actions, vec!["PAYMENT_COMPLETED", "PAYMENT_REFUNDED"]);
}

#[tokio::test]
async fn refund_of_failed_payment_is_invalid_state() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_ERROR");
    let outcome = svc.create_payment(bkash(dec!(1000)), &guardian()).await.unwrap();

    let err = svc
        .refund_payment(
            outcome.payment.id,
            RefundRequest {
                amount: None,
                reason: Some("duplicate".to_string()),
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let stored = PaymentStore::get(&store, outcome.payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    assert_eq!(store.audit_entries().await.len(), 1);
}

#[tokio::test]
async fn refund_above_paid_amount_is_rejected() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    let outcome = svc.create_payment(bkash(dec!(1000)), &guardian()).await.unwrap();

    let err = svc
        .refund_payment(
            outcome.payment.id,
            RefundRequest {
                amount: Some(dec!(1000.01)),
                reason: Some("over".to_string()),
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));
}

#[tokio::test]
async fn refund_requires_reason_and_admin() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    let payer = guardian();
    let outcome = svc.create_payment(bkash(dec!(1000)), &payer).await.unwrap();

    let err = svc
        .refund_payment(
            outcome.payment.id,
            RefundRequest {
                amount: None,
                reason: Some("please".to_string()),
            },
            &payer,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let err = svc
        .refund_payment(
            outcome.payment.id,
            RefundRequest {
                amount: None,
                reason: Some("   ".to_string()),
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn guardians_only_list_their_own_payments() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    let alice = guardian();
    let bob = guardian();

    svc.create_payment(bkash(dec!(100)), &alice).await.unwrap();
    svc.create_payment(bkash(dec!(200)), &alice).await.unwrap();
    svc.create_payment(bkash(dec!(300)), &bob).await.unwrap();

    let (mine, page) = svc.list_payments(PaymentFilter::default(), &alice).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(page.total, 2);
    assert!(mine.iter().all(|p| p.payer_id == alice.actor_id));

    let (all, _) = svc.list_payments(PaymentFilter::default(), &admin()).await.unwrap();
    assert_eq!(all.len(), 3);

    let filter = PaymentFilter {
        limit: Some(1),
        page: Some(2),
        ..Default::default()
    };
    let (second, page) = svc.list_payments(filter, &admin()).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_next_page && page.has_previous_page);
}

#[tokio::test]
async fn execute_reports_provider_state() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    let payer = guardian();
    let outcome = svc.create_payment(bkash(dec!(700)), &payer).await.unwrap();

    let (payment, gp) = svc.execute_payment(outcome.payment.id, &payer).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(Some(gp.payment_id), payment.gateway_payment_id);
    // Already final, so no extra audit entry.
    assert_eq!(store.audit_entries().await.len(), 1);

    let other = guardian();
    let err = svc.query_payment(outcome.payment.id, &other).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
}

#[tokio::test]
async fn supported_methods_follow_registry() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    assert_eq!(svc.supported_methods(), vec![PaymentMethod::Bkash]);
}

#[tokio::test]
async fn created_payment_holds_escrow_minus_platform_fee() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    let payer = guardian();
    let outcome = svc.create_payment(bkash(dec!(2000)), &payer).await.unwrap();

    let escrow = svc.get_escrow(outcome.payment.id, &payer).await.unwrap();
    assert_eq!(escrow.status, EscrowStatus::Held);
    assert_eq!(escrow.amount, dec!(2000));
    assert_eq!(escrow.fee, dec!(100.00));
    assert_eq!(escrow.payout(), dec!(1900));
    assert!(escrow.released_at.is_none());

    let err = svc.get_escrow(outcome.payment.id, &guardian()).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
}

#[tokio::test]
async fn admin_releases_escrow_once() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    let outcome = svc.create_payment(bkash(dec!(1000)), &guardian()).await.unwrap();

    let err = svc.release_escrow(outcome.payment.id, &guardian()).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let released = svc.release_escrow(outcome.payment.id, &admin()).await.unwrap();
    assert_eq!(released.status, EscrowStatus::Released);
    assert!(released.released_at.is_some());

    let err = svc.release_escrow(outcome.payment.id, &admin()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let audit = store.audit_entries().await;
    let actions: Vec<&str> = audit.iter().map(|e| e.action_type.as_str()).collect();
    assert_eq!(actions, vec!["PAYMENT_COMPLETED", "ESCROW_RELEASED"]);
    let changes = audit[1].changes.as_ref().unwrap();
    assert_eq!(changes["fee"], serde_json::json!(dec!(50.00)));
    assert_eq!(changes["payout"], serde_json::json!(dec!(950.00)));

    let stored = PaymentStore::escrow_for(&store, outcome.payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EscrowStatus::Released);
}

#[tokio::test]
async fn escrow_of_unfinished_payment_stays_held() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_ERROR");
    let outcome = svc.create_payment(bkash(dec!(1000)), &guardian()).await.unwrap();

    let err = svc.release_escrow(outcome.payment.id, &admin()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let stored = PaymentStore::escrow_for(&store, outcome.payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EscrowStatus::Held);
    assert_eq!(store.audit_entries().await.len(), 1);
}

#[tokio::test]
async fn released_escrow_blocks_refund() {
    let store = MemoryStore::new();
    let svc = service(&store, "ALWAYS_SUCCESS");
    let outcome = svc.create_payment(bkash(dec!(1000)), &guardian()).await.unwrap();
    svc.release_escrow(outcome.payment.id, &admin()).await.unwrap();

    let err = svc
        .refund_payment(
            outcome.payment.id,
            RefundRequest {
                amount: None,
                reason: Some("Guardian cancelled".to_string()),
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let stored = PaymentStore::get(&store, outcome.payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
}
