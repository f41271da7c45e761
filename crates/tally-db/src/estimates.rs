//! Estimate repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tally_core::{
    new_v7, Error, Estimate, EstimateRepository, EstimateStatus, LineItem, NewEstimate, Result,
};

use crate::invoices::{ensure_client_owned, next_document_number, DocumentKind};

const ESTIMATE_COLUMNS: &str = "id, owner_id, client_id, estimate_number, status, currency, \
     issue_date, valid_until, line_items, tax_rate_bps, subtotal_cents, tax_cents, \
     total_cents, notes, converted_invoice_id, created_at, updated_at";

/// PostgreSQL implementation of EstimateRepository.
pub struct PgEstimateRepository {
    pool: Pool<Postgres>,
}

impl PgEstimateRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &sqlx::postgres::PgRow) -> Result<Estimate> {
        let status: String = row.get("status");
        let Json(line_items): Json<Vec<LineItem>> = row.get("line_items");
        Ok(Estimate {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            client_id: row.get("client_id"),
            estimate_number: row.get("estimate_number"),
            status: status.parse()?,
            currency: row.get("currency"),
            issue_date: row.get("issue_date"),
            valid_until: row.get("valid_until"),
            line_items,
            tax_rate_bps: row.get("tax_rate_bps"),
            subtotal_cents: row.get("subtotal_cents"),
            tax_cents: row.get("tax_cents"),
            total_cents: row.get("total_cents"),
            notes: row.get("notes"),
            converted_invoice_id: row.get("converted_invoice_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl EstimateRepository for PgEstimateRepository {
    async fn insert(&self, estimate: NewEstimate) -> Result<Estimate> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        ensure_client_owned(&mut tx, estimate.owner_id, estimate.client_id).await?;
        let number =
            next_document_number(&mut tx, estimate.owner_id, DocumentKind::Estimate).await?;
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO estimate (id, owner_id, client_id, estimate_number, status, currency,
                                   issue_date, valid_until, line_items, tax_rate_bps,
                                   subtotal_cents, tax_cents, total_cents, notes,
                                   created_at, updated_at)
             VALUES ($1, $2, $3, $4, 'draft', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
             RETURNING {ESTIMATE_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(estimate.owner_id)
        .bind(estimate.client_id)
        .bind(&number)
        .bind(&estimate.currency)
        .bind(estimate.issue_date)
        .bind(estimate.valid_until)
        .bind(Json(&estimate.line_items))
        .bind(estimate.tax_rate_bps)
        .bind(estimate.totals.subtotal_cents)
        .bind(estimate.totals.tax_cents)
        .bind(estimate.totals.total_cents)
        .bind(&estimate.notes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let created = Self::parse_row(&row)?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(created)
    }

    async fn fetch(&self, owner_id: Uuid, id: Uuid) -> Result<Estimate> {
        let row = sqlx::query(&format!(
            "SELECT {ESTIMATE_COLUMNS} FROM estimate WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => Self::parse_row(&row),
            None => Err(Error::NotFound(format!("estimate {}", id))),
        }
    }

    async fn list(
        &self,
        owner_id: Uuid,
        status: Option<EstimateStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Estimate>> {
        let rows = sqlx::query(&format!(
            "SELECT {ESTIMATE_COLUMNS} FROM estimate
             WHERE owner_id = $1 AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(owner_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[EstimateStatus],
        next: EstimateStatus,
    ) -> Result<Option<Estimate>> {
        let expected: Vec<&str> = expected.iter().map(|s| s.as_str()).collect();
        let row = sqlx::query(&format!(
            "UPDATE estimate SET status = $2, updated_at = now()
             WHERE id = $1 AND status = ANY($3)
             RETURNING {ESTIMATE_COLUMNS}"
        ))
        .bind(id)
        .bind(next.as_str())
        .bind(&expected)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn set_converted_invoice(&self, id: Uuid, invoice_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE estimate SET converted_invoice_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(invoice_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("estimate {}", id)));
        }
        Ok(())
    }
}
