use crate::domain::audit::AuditLogEntry;
use crate::domain::user::{User, UserFilter, UserMutation};
use crate::repo::audit_log_repo::AuditLogRepo;
use crate::repo::UserStore;
use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

const COLUMNS: &str = "id, role, phone, email, name, language, kyc_status, is_active, password_hash, \
     deleted_at, last_login_at, created_at, updated_at";

#[derive(Clone)]
pub struct UsersRepo {
    pub pool: PgPool,
}

fn from_row(r: &PgRow) -> Result<User> {
    let role: String = r.get("role");
    let language: String = r.get("language");
    let kyc_status: String = r.get("kyc_status");
    Ok(User {
        id: r.get("id"),
        role: role.parse().map_err(|e: String| anyhow!(e))?,
        phone: r.get("phone"),
        email: r.get("email"),
        name: r.get("name"),
        language: language.parse().map_err(|e: String| anyhow!(e))?,
        kyc_status: kyc_status.parse().map_err(|e: String| anyhow!(e))?,
        is_active: r.get("is_active"),
        password_hash: r.get("password_hash"),
        deleted_at: r.get("deleted_at"),
        last_login_at: r.get("last_login_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    qb.push(" WHERE deleted_at IS NULL");
    if let Some(role) = filter.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(is_active) = filter.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
    if let Some(kyc) = filter.kyc_status {
        qb.push(" AND kyc_status = ").push_bind(kyc.as_str());
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait::async_trait]
impl UserStore for UsersRepo {
    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(from_row).transpose()
    }

    async fn find_by_phone_or_email(&self, phone: &str, email: Option<&str>) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM users WHERE phone = $1 OR ($2::text IS NOT NULL AND email = $2) LIMIT 1"
        ))
        .bind(phone)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM users WHERE email = $1 LIMIT 1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(from_row).transpose()
    }

    async fn insert(&self, user: &User, audit: AuditLogEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO users (
                id, role, phone, email, name, language, kyc_status, is_active, password_hash,
                deleted_at, last_login_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.language.as_str())
        .bind(user.kyc_status.as_str())
        .bind(user.is_active)
        .bind(&user.password_hash)
        .bind(user.deleted_at)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(tx.as_mut())
        .await?;
        AuditLogRepo::insert_tx(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, id: Uuid, mutation: &UserMutation, audit: AuditLogEntry) -> Result<Option<User>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET
                is_active = COALESCE($2, is_active),
                kyc_status = COALESCE($3, kyc_status),
                deleted_at = COALESCE($4, deleted_at),
                name = COALESCE($5, name),
                email = COALESCE($6, email),
                language = COALESCE($7, language),
                password_hash = COALESCE($8, password_hash),
                updated_at = now()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(mutation.is_active)
        .bind(mutation.kyc_status.map(|k| k.as_str()))
        .bind(mutation.deleted_at)
        .bind(&mutation.name)
        .bind(&mutation.email)
        .bind(mutation.language.map(|l| l.as_str()))
        .bind(&mutation.password_hash)
        .fetch_optional(tx.as_mut())
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let user = from_row(&row)?;
        AuditLogRepo::insert_tx(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(Some(user))
    }

    async fn list(&self, filter: &UserFilter) -> Result<(Vec<User>, i64)> {
        let mut count_q = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM users");
        push_filters(&mut count_q, filter);
        let total: i64 = count_q.build().fetch_one(&self.pool).await?.get("total");

        let mut q = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM users"));
        push_filters(&mut q, filter);
        q.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit())
            .push(" OFFSET ")
            .push_bind(filter.offset());
        let rows = q.build().fetch_all(&self.pool).await?;

        let users = rows.iter().map(from_row).collect::<Result<Vec<_>>>()?;
        Ok((users, total))
    }
}
