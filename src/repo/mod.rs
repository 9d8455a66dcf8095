use crate::domain::audit::AuditLogEntry;
use crate::domain::escrow::Escrow;
use crate::domain::payment::{Payment, PaymentFilter, PaymentStatus, PaymentUpdate};
use crate::domain::user::{User, UserFilter, UserMutation};
use anyhow::Result;
use uuid::Uuid;

pub mod audit_log_repo;
pub mod memory;
pub mod payments_repo;
pub mod session_store;
pub mod users_repo;

/// Every mutating method takes the audit entry that describes it and
/// persists both in one unit, or neither.
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// The PENDING payment and its HELD escrow are written together.
    async fn insert(&self, payment: &Payment, escrow: &Escrow) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Payment>>;

    /// Lookup by provider paymentID, invoice number, or transaction id.
    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>>;

    /// Compare-and-set on status. `Ok(None)` means the payment was not in `from`.
    async fn transition(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
        update: PaymentUpdate,
        audit: AuditLogEntry,
    ) -> Result<Option<Payment>>;

    async fn list(&self, filter: &PaymentFilter) -> Result<(Vec<Payment>, i64)>;

    async fn escrow_for(&self, payment_id: Uuid) -> Result<Option<Escrow>>;

    /// HELD → RELEASED. `Ok(None)` means there was no HELD escrow for the payment.
    async fn release_escrow(&self, payment_id: Uuid, audit: AuditLogEntry) -> Result<Option<Escrow>>;
}

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_phone_or_email(&self, phone: &str, email: Option<&str>) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn insert(&self, user: &User, audit: AuditLogEntry) -> Result<()>;

    /// `Ok(None)` when the user does not exist.
    async fn update(&self, id: Uuid, mutation: &UserMutation, audit: AuditLogEntry) -> Result<Option<User>>;

    async fn list(&self, filter: &UserFilter) -> Result<(Vec<User>, i64)>;
}

#[async_trait::async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditLogEntry>>;
}

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Logs the user out everywhere; returns how many sessions were dropped.
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64>;
}
