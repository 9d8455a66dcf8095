use carenet_payments::domain::bulk::{BulkAction, BulkActionRequest};
use carenet_payments::domain::context::RequestContext;
use carenet_payments::domain::user::{KycStatus, Language, User, UserRole};
use carenet_payments::error::AppError;
use carenet_payments::repo::memory::MemoryStore;
use carenet_payments::repo::session_store::MemorySessionStore;
use carenet_payments::repo::UserStore;
use carenet_payments::service::bulk_actions::BulkActionProcessor;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

fn caregiver(phone: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        role: UserRole::Caregiver,
        phone: phone.to_string(),
        email: None,
        name: "Shirin Akter".to_string(),
        language: Language::Bn,
        kyc_status: KycStatus::Pending,
        is_active: true,
        password_hash: "$2b$04$placeholder".to_string(),
        deleted_at: None,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn moderator() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), UserRole::Moderator)
}

fn processor(store: &MemoryStore, sessions: &MemorySessionStore, concurrency: usize) -> BulkActionProcessor {
    BulkActionProcessor::new(Arc::new(store.clone()), Arc::new(sessions.clone())).with_concurrency(concurrency)
}

async fn seeded(store: &MemoryStore, n: usize) -> Vec<User> {
    let mut users = Vec::new();
    for i in 0..n {
        let u = caregiver(&format!("0171000000{i}"));
        store.seed_user(u.clone()).await;
        users.push(u);
    }
    users
}

fn request(ids: Vec<String>, action: BulkAction) -> BulkActionRequest {
    BulkActionRequest {
        user_ids: ids,
        action,
        reason: Some("Quarterly review".to_string()),
    }
}

#[tokio::test]
async fn missing_user_fails_alone() {
    let store = MemoryStore::new();
    let sessions = MemorySessionStore::new();
    let users = seeded(&store, 3).await;
    let ghost = Uuid::new_v4().to_string();

    let ids = vec![users[0].id.to_string(), ghost.clone(), users[1].id.to_string(), users[2].id.to_string()];
    let report = processor(&store, &sessions, 4)
        .process(request(ids.clone(), BulkAction::VerifyKyc), &moderator())
        .await
        .unwrap();

    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.successful, 3);
    assert_eq!(report.summary.failed, 1);

    let order: Vec<&str> = report.results.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(order, ids.iter().map(String::as_str).collect::<Vec<_>>());

    let missing = &report.results[1];
    assert!(!missing.success);
    assert_eq!(missing.error.as_deref(), Some("User not found"));
    assert_eq!(missing.action, BulkAction::VerifyKyc);

    for u in &users {
        let stored = store.get(u.id).await.unwrap().unwrap();
        assert_eq!(stored.kyc_status, KycStatus::Verified);
    }
    let audit = store.audit_entries().await;
    assert_eq!(audit.len(), 3);
    assert!(audit.iter().all(|e| e.action_type == "USER_KYC_VERIFIED"));
    assert_eq!(audit[0].changes.as_ref().unwrap()["reason"], "Quarterly review");
}

#[tokio::test]
async fn malformed_id_is_reported() {
    let store = MemoryStore::new();
    let sessions = MemorySessionStore::new();
    let users = seeded(&store, 1).await;

    let report = processor(&store, &sessions, 2)
        .process(
            request(vec!["not-a-uuid".to_string(), users[0].id.to_string()], BulkAction::Activate),
            &moderator(),
        )
        .await
        .unwrap();
    assert_eq!(report.results[0].error.as_deref(), Some("Invalid user ID"));
    assert_eq!(report.results[0].action, BulkAction::Activate);
    assert!(report.results[1].success);
    assert_eq!(report.results[1].action, BulkAction::Activate);
}

#[tokio::test]
async fn store_failure_does_not_stop_batch() {
    let store = MemoryStore::new();
    let sessions = MemorySessionStore::new();
    let users = seeded(&store, 3).await;
    store.fail_updates_for(users[1].id).await;

    let ids = users.iter().map(|u| u.id.to_string()).collect();
    let report = processor(&store, &sessions, 1)
        .process(request(ids, BulkAction::Deactivate), &moderator())
        .await
        .unwrap();

    assert_eq!(report.summary.successful, 2);
    assert!(!report.results[1].success);
    assert!(report.results[1].error.as_deref().unwrap().contains("could not update"));
    assert!(!store.get(users[0].id).await.unwrap().unwrap().is_active);
    assert!(store.get(users[1].id).await.unwrap().unwrap().is_active);
    assert_eq!(store.audit_entries().await.len(), 2);
}

#[tokio::test]
async fn delete_is_soft_and_revokes_sessions() {
    let store = MemoryStore::new();
    let sessions = MemorySessionStore::new();
    let users = seeded(&store, 1).await;
    sessions.open(users[0].id).await;
    sessions.open(users[0].id).await;
    assert_eq!(sessions.active(users[0].id).await, 2);

    let report = processor(&store, &sessions, 4)
        .process(request(vec![users[0].id.to_string()], BulkAction::Delete), &moderator())
        .await
        .unwrap();
    assert!(report.results[0].success);

    let stored = store.get(users[0].id).await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert!(stored.deleted_at.is_some());
    assert_eq!(sessions.active(users[0].id).await, 0);
    assert_eq!(store.audit_entries().await[0].action_type, "USER_DELETED");
}

#[tokio::test]
async fn activate_keeps_sessions() {
    let store = MemoryStore::new();
    let sessions = MemorySessionStore::new();
    let users = seeded(&store, 1).await;
    sessions.open(users[0].id).await;

    processor(&store, &sessions, 4)
        .process(request(vec![users[0].id.to_string()], BulkAction::Activate), &moderator())
        .await
        .unwrap();
    assert_eq!(sessions.active(users[0].id).await, 1);
}

#[tokio::test]
async fn empty_list_is_validation_error() {
    let store = MemoryStore::new();
    let sessions = MemorySessionStore::new();
    let err = processor(&store, &sessions, 4)
        .process(request(vec![], BulkAction::Activate), &moderator())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { details: Some(_), .. }));
}

#[tokio::test]
async fn guardians_cannot_run_bulk_actions() {
    let store = MemoryStore::new();
    let sessions = MemorySessionStore::new();
    let users = seeded(&store, 1).await;
    let ctx = RequestContext::new(Uuid::new_v4(), UserRole::Guardian);

    let err = processor(&store, &sessions, 4)
        .process(request(vec![users[0].id.to_string()], BulkAction::Delete), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
    assert!(store.audit_entries().await.is_empty());
}
