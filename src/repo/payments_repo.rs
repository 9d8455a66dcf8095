use crate::domain::audit::AuditLogEntry;
use crate::domain::escrow::Escrow;
use crate::domain::payment::{Payment, PaymentFilter, PaymentStatus, PaymentUpdate};
use crate::repo::audit_log_repo::AuditLogRepo;
use crate::repo::PaymentStore;
use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

const ESCROW_COLUMNS: &str = "id, payment_id, amount, fee, status, created_at, released_at";

const COLUMNS: &str = "id, payer_id, job_id, amount, method, status, transaction_id, invoice_number, \
     gateway_payment_id, gateway_response, refund_amount, refund_reason, paid_at, created_at, updated_at";

#[derive(Clone)]
pub struct PaymentsRepo {
    pub pool: PgPool,
}

fn from_row(r: &PgRow) -> Result<Payment> {
    let method: String = r.get("method");
    let status: String = r.get("status");
    Ok(Payment {
        id: r.get("id"),
        payer_id: r.get("payer_id"),
        job_id: r.get("job_id"),
        amount: r.get("amount"),
        method: method.parse().map_err(|e: String| anyhow!(e))?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        transaction_id: r.get("transaction_id"),
        invoice_number: r.get("invoice_number"),
        gateway_payment_id: r.get("gateway_payment_id"),
        gateway_response: r.get("gateway_response"),
        refund_amount: r.get("refund_amount"),
        refund_reason: r.get("refund_reason"),
        paid_at: r.get("paid_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn escrow_from_row(r: &PgRow) -> Result<Escrow> {
    let status: String = r.get("status");
    Ok(Escrow {
        id: r.get("id"),
        payment_id: r.get("payment_id"),
        amount: r.get("amount"),
        fee: r.get("fee"),
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        created_at: r.get("created_at"),
        released_at: r.get("released_at"),
    })
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PaymentFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(payer_id) = filter.payer_id {
        qb.push(" AND payer_id = ").push_bind(payer_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(method) = filter.method {
        qb.push(" AND method = ").push_bind(method.as_str());
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (invoice_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR transaction_id ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait::async_trait]
impl PaymentStore for PaymentsRepo {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(&self, payment: &Payment, escrow: &Escrow) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, payer_id, job_id, amount, method, status, transaction_id, invoice_number,
                gateway_payment_id, gateway_response, refund_amount, refund_reason, paid_at,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8,
                $9, $10, $11, $12, $13,
                $14, $15
            )
            "#,
        )
        .bind(payment.id)
        .bind(payment.payer_id)
        .bind(payment.job_id)
        .bind(payment.amount)
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(&payment.invoice_number)
        .bind(&payment.gateway_payment_id)
        .bind(&payment.gateway_response)
        .bind(payment.refund_amount)
        .bind(&payment.refund_reason)
        .bind(payment.paid_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(tx.as_mut())
        .await?;

        sqlx::query(
            "INSERT INTO escrows (id, payment_id, amount, fee, status, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(escrow.id)
        .bind(escrow.payment_id)
        .bind(escrow.amount)
        .bind(escrow.fee)
        .bind(escrow.status.as_str())
        .bind(escrow.created_at)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM payments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(from_row).transpose()
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM payments \
             WHERE gateway_payment_id = $1 OR invoice_number = $1 OR transaction_id = $1 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(from_row).transpose()
    }

    async fn transition(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
        update: PaymentUpdate,
        audit: AuditLogEntry,
    ) -> Result<Option<Payment>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments SET
                status = $3,
                gateway_payment_id = COALESCE($4, gateway_payment_id),
                gateway_response = COALESCE($5, gateway_response),
                paid_at = COALESCE($6, paid_at),
                refund_amount = COALESCE($7, refund_amount),
                refund_reason = COALESCE($8, refund_reason),
                updated_at = now()
            WHERE id = $1 AND status = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(update.gateway_payment_id)
        .bind(update.gateway_response)
        .bind(update.paid_at)
        .bind(update.refund_amount)
        .bind(update.refund_reason)
        .fetch_optional(tx.as_mut())
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let payment = from_row(&row)?;
        AuditLogRepo::insert_tx(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(Some(payment))
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<(Vec<Payment>, i64)> {
        let mut count_q = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM payments");
        push_filters(&mut count_q, filter);
        let total: i64 = count_q.build().fetch_one(&self.pool).await?.get("total");

        let mut q = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM payments"));
        push_filters(&mut q, filter);
        q.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit())
            .push(" OFFSET ")
            .push_bind(filter.offset());
        let rows = q.build().fetch_all(&self.pool).await?;

        let payments = rows.iter().map(from_row).collect::<Result<Vec<_>>>()?;
        Ok((payments, total))
    }

    async fn escrow_for(&self, payment_id: Uuid) -> Result<Option<Escrow>> {
        let row = sqlx::query(&format!("SELECT {ESCROW_COLUMNS} FROM escrows WHERE payment_id = $1"))
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(escrow_from_row).transpose()
    }

    async fn release_escrow(&self, payment_id: Uuid, audit: AuditLogEntry) -> Result<Option<Escrow>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            r#"
            UPDATE escrows SET status = 'RELEASED', released_at = now()
            WHERE payment_id = $1 AND status = 'HELD'
            RETURNING {ESCROW_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .fetch_optional(tx.as_mut())
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let escrow = escrow_from_row(&row)?;
        AuditLogRepo::insert_tx(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(Some(escrow))
    }
}
