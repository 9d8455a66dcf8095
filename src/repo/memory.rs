use crate::domain::audit::AuditLogEntry;
use crate::domain::escrow::{Escrow, EscrowStatus};
use crate::domain::payment::{Payment, PaymentFilter, PaymentStatus, PaymentUpdate};
use crate::domain::user::{User, UserFilter, UserMutation};
use crate::repo::{AuditLogStore, PaymentStore, UserStore};
use anyhow::{bail, Result};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    payments: HashMap<Uuid, Payment>,
    escrows: HashMap<Uuid, Escrow>,
    audit: Vec<AuditLogEntry>,
    failing_users: HashSet<Uuid>,
}

/// Process-local store. One lock covers every table, so a mutation and its
/// audit entry land together.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    /// Makes every later update of `user_id` fail, as a broken row would.
    pub async fn fail_updates_for(&self, user_id: Uuid) {
        self.state.lock().await.failing_users.insert(user_id);
    }

    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.state.lock().await.audit.clone()
    }

    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }
}

fn page<T: Clone>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait::async_trait]
impl PaymentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, payment: &Payment, escrow: &Escrow) -> Result<()> {
        let mut state = self.state.lock().await;
        let duplicate = state.payments.values().any(|p| {
            p.id == payment.id
                || p.transaction_id == payment.transaction_id
                || p.invoice_number == payment.invoice_number
        });
        if duplicate {
            bail!("duplicate payment {}", payment.id);
        }
        state.payments.insert(payment.id, payment.clone());
        state.escrows.insert(escrow.payment_id, escrow.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.state.lock().await.payments.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>> {
        Ok(self
            .state
            .lock()
            .await
            .payments
            .values()
            .filter(|p| {
                p.gateway_payment_id.as_deref() == Some(reference)
                    || p.invoice_number == reference
                    || p.transaction_id == reference
            })
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
        update: PaymentUpdate,
        audit: AuditLogEntry,
    ) -> Result<Option<Payment>> {
        let mut state = self.state.lock().await;
        let Some(payment) = state.payments.get_mut(&id) else {
            return Ok(None);
        };
        if payment.status != from {
            return Ok(None);
        }

        payment.status = to;
        if update.gateway_payment_id.is_some() {
            payment.gateway_payment_id = update.gateway_payment_id;
        }
        if update.gateway_response.is_some() {
            payment.gateway_response = update.gateway_response;
        }
        if update.paid_at.is_some() {
            payment.paid_at = update.paid_at;
        }
        if update.refund_amount.is_some() {
            payment.refund_amount = update.refund_amount;
        }
        if update.refund_reason.is_some() {
            payment.refund_reason = update.refund_reason;
        }
        payment.updated_at = Utc::now();
        let updated = payment.clone();

        state.audit.push(audit);
        Ok(Some(updated))
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<(Vec<Payment>, i64)> {
        let state = self.state.lock().await;
        let search = filter.search.as_deref().unwrap_or("").to_lowercase();
        let mut matched: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| filter.payer_id.map_or(true, |id| p.payer_id == id))
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .filter(|p| filter.method.map_or(true, |m| p.method == m))
            .filter(|p| {
                search.is_empty()
                    || p.invoice_number.to_lowercase().contains(&search)
                    || p.transaction_id.to_lowercase().contains(&search)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as i64;
        Ok((page(matched, filter.offset(), filter.limit()), total))
    }

    async fn escrow_for(&self, payment_id: Uuid) -> Result<Option<Escrow>> {
        Ok(self.state.lock().await.escrows.get(&payment_id).cloned())
    }

    async fn release_escrow(&self, payment_id: Uuid, audit: AuditLogEntry) -> Result<Option<Escrow>> {
        let mut state = self.state.lock().await;
        let Some(escrow) = state.escrows.get_mut(&payment_id) else {
            return Ok(None);
        };
        if escrow.status != EscrowStatus::Held {
            return Ok(None);
        }
        escrow.status = EscrowStatus::Released;
        escrow.released_at = Some(Utc::now());
        let released = escrow.clone();

        state.audit.push(audit);
        Ok(Some(released))
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_by_phone_or_email(&self, phone: &str, email: Option<&str>) -> Result<Option<User>> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .values()
            .find(|u| u.phone == phone || (email.is_some() && u.email.as_deref() == email))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn insert(&self, user: &User, audit: AuditLogEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.id) {
            bail!("duplicate user {}", user.id);
        }
        state.users.insert(user.id, user.clone());
        state.audit.push(audit);
        Ok(())
    }

    async fn update(&self, id: Uuid, mutation: &UserMutation, audit: AuditLogEntry) -> Result<Option<User>> {
        let mut state = self.state.lock().await;
        if state.failing_users.contains(&id) {
            bail!("could not update user {id}: row is locked");
        }
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        mutation.apply(user, Utc::now());
        let updated = user.clone();
        state.audit.push(audit);
        Ok(Some(updated))
    }

    async fn list(&self, filter: &UserFilter) -> Result<(Vec<User>, i64)> {
        let state = self.state.lock().await;
        let search = filter.search.as_deref().unwrap_or("").to_lowercase();
        let mut matched: Vec<User> = state
            .users
            .values()
            .filter(|u| u.deleted_at.is_none())
            .filter(|u| filter.role.map_or(true, |r| u.role == r))
            .filter(|u| filter.is_active.map_or(true, |a| u.is_active == a))
            .filter(|u| filter.kyc_status.map_or(true, |k| u.kyc_status == k))
            .filter(|u| {
                search.is_empty()
                    || u.name.to_lowercase().contains(&search)
                    || u.phone.to_lowercase().contains(&search)
                    || u.email.as_deref().unwrap_or("").to_lowercase().contains(&search)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as i64;
        Ok((page(matched, filter.offset(), filter.limit()), total))
    }
}

#[async_trait::async_trait]
impl AuditLogStore for MemoryStore {
    async fn for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditLogEntry>> {
        Ok(self
            .state
            .lock()
            .await
            .audit
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect())
    }
}
