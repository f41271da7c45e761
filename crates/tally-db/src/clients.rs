//! Client repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tally_core::{
    new_v7, Client, ClientRepository, CreateClientRequest, Error, Result, UpdateClientRequest,
};

/// SQLSTATE for `foreign_key_violation`.
pub(crate) const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(PG_FOREIGN_KEY_VIOLATION)
    )
}

/// PostgreSQL implementation of ClientRepository.
pub struct PgClientRepository {
    pool: Pool<Postgres>,
}

impl PgClientRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Client {
        Client {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            name: row.get("name"),
            email: row.get("email"),
            company: row.get("company"),
            address: row.get("address"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl ClientRepository for PgClientRepository {
    async fn insert(&self, owner_id: Uuid, req: CreateClientRequest) -> Result<Client> {
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO client
                 (id, owner_id, name, email, company, address, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING id, owner_id, name, email, company, address, created_at, updated_at",
        )
        .bind(new_v7())
        .bind(owner_id)
        .bind(&req.name)
        .bind(&req.email)
        .bind(&req.company)
        .bind(&req.address)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_row(row))
    }

    async fn fetch(&self, owner_id: Uuid, id: Uuid) -> Result<Client> {
        let row = sqlx::query(
            "SELECT id, owner_id, name, email, company, address, created_at, updated_at
             FROM client WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).ok_or(Error::ClientNotFound(id))
    }

    async fn list(&self, owner_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Client>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, name, email, company, address, created_at, updated_at
             FROM client WHERE owner_id = $1
             ORDER BY name ASC, id ASC
             LIMIT $2 OFFSET $3",
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn update(&self, owner_id: Uuid, id: Uuid, req: UpdateClientRequest) -> Result<Client> {
        let row = sqlx::query(
            "UPDATE client
             SET name = COALESCE($3, name),
                 email = COALESCE($4, email),
                 company = COALESCE($5, company),
                 address = COALESCE($6, address),
                 updated_at = $7
             WHERE id = $1 AND owner_id = $2
             RETURNING id, owner_id, name, email, company, address, created_at, updated_at",
        )
        .bind(id)
        .bind(owner_id)
        .bind(&req.name)
        .bind(&req.email)
        .bind(&req.company)
        .bind(&req.address)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).ok_or(Error::ClientNotFound(id))
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM client WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::InvalidInput(
                        "client still has invoices or estimates and cannot be deleted".to_string(),
                    )
                } else {
                    Error::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::ClientNotFound(id));
        }
        Ok(())
    }

    async fn count_for_owner(&self, owner_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM client WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }
}
