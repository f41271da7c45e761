//! Invoice repository implementation.
//!
//! Line items are stored as a JSONB array next to the computed totals.
//! Invoice numbers come from the per-owner `document_counter` row, bumped in
//! the same transaction as the insert so numbers are never reused.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use tally_core::{
    new_v7, Error, Invoice, InvoiceRepository, InvoiceStatus, LineItem, ListInvoicesRequest,
    NewInvoice, ReminderCandidate, Result,
};

pub(crate) const INVOICE_COLUMNS: &str = "i.id, i.owner_id, i.client_id, i.invoice_number, \
     i.status, i.currency, i.issue_date, i.due_date, i.line_items, i.tax_rate_bps, \
     i.subtotal_cents, i.tax_cents, i.total_cents, i.notes, i.checkout_session_id, \
     i.sent_at, i.paid_at, i.created_at, i.updated_at";

/// Document kinds numbered through `document_counter`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DocumentKind {
    Invoice,
    Estimate,
}

impl DocumentKind {
    fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Estimate => "estimate",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "INV",
            DocumentKind::Estimate => "EST",
        }
    }

    pub(crate) fn format(self, seq: i32) -> String {
        format!("{}-{:04}", self.prefix(), seq)
    }
}

/// Bump the owner's counter for `kind` and return the formatted number.
pub(crate) async fn next_document_number(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: Uuid,
    kind: DocumentKind,
) -> Result<String> {
    let seq: i32 = sqlx::query_scalar(
        "INSERT INTO document_counter (owner_id, kind, last_value)
         VALUES ($1, $2, 1)
         ON CONFLICT (owner_id, kind)
         DO UPDATE SET last_value = document_counter.last_value + 1
         RETURNING last_value",
    )
    .bind(owner_id)
    .bind(kind.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(kind.format(seq))
}

/// Fail with `ClientNotFound` unless `client_id` belongs to `owner_id`.
pub(crate) async fn ensure_client_owned(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: Uuid,
    client_id: Uuid,
) -> Result<()> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM client WHERE id = $1 AND owner_id = $2)",
    )
    .bind(client_id)
    .bind(owner_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(Error::Database)?;
    if exists {
        Ok(())
    } else {
        Err(Error::ClientNotFound(client_id))
    }
}

/// PostgreSQL implementation of InvoiceRepository.
pub struct PgInvoiceRepository {
    pool: Pool<Postgres>,
}

impl PgInvoiceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub(crate) fn parse_row(row: &sqlx::postgres::PgRow) -> Result<Invoice> {
        let status: String = row.get("status");
        let Json(line_items): Json<Vec<LineItem>> = row.get("line_items");
        Ok(Invoice {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            client_id: row.get("client_id"),
            invoice_number: row.get("invoice_number"),
            status: status.parse()?,
            currency: row.get("currency"),
            issue_date: row.get("issue_date"),
            due_date: row.get("due_date"),
            line_items,
            tax_rate_bps: row.get("tax_rate_bps"),
            subtotal_cents: row.get("subtotal_cents"),
            tax_cents: row.get("tax_cents"),
            total_cents: row.get("total_cents"),
            notes: row.get("notes"),
            checkout_session_id: row.get("checkout_session_id"),
            sent_at: row.get("sent_at"),
            paid_at: row.get("paid_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn parse_candidate(row: &sqlx::postgres::PgRow) -> Result<ReminderCandidate> {
        Ok(ReminderCandidate {
            invoice: Self::parse_row(row)?,
            client_name: row.get("client_name"),
            client_email: row.get("client_email"),
        })
    }
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    async fn insert(&self, invoice: NewInvoice) -> Result<Invoice> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        ensure_client_owned(&mut tx, invoice.owner_id, invoice.client_id).await?;
        let number = next_document_number(&mut tx, invoice.owner_id, DocumentKind::Invoice).await?;
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO invoice AS i (id, owner_id, client_id, invoice_number, status, currency,
                                  issue_date, due_date, line_items, tax_rate_bps,
                                  subtotal_cents, tax_cents, total_cents, notes,
                                  created_at, updated_at)
             VALUES ($1, $2, $3, $4, 'draft', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(invoice.owner_id)
        .bind(invoice.client_id)
        .bind(&number)
        .bind(&invoice.currency)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(Json(&invoice.line_items))
        .bind(invoice.tax_rate_bps)
        .bind(invoice.totals.subtotal_cents)
        .bind(invoice.totals.tax_cents)
        .bind(invoice.totals.total_cents)
        .bind(&invoice.notes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let created = Self::parse_row(&row)?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(created)
    }

    async fn fetch(&self, owner_id: Uuid, id: Uuid) -> Result<Invoice> {
        let row = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoice i WHERE i.id = $1 AND i.owner_id = $2"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => Self::parse_row(&row),
            None => Err(Error::InvoiceNotFound(id)),
        }
    }

    async fn list(&self, owner_id: Uuid, req: ListInvoicesRequest) -> Result<Vec<Invoice>> {
        // NULL limit/offset mean "all" and "0" in PostgreSQL.
        let rows = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoice i
             WHERE i.owner_id = $1
               AND ($2::text IS NULL OR i.status = $2)
               AND ($3::uuid IS NULL OR i.client_id = $3)
             ORDER BY i.created_at DESC, i.id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(owner_id)
        .bind(req.status.map(|s| s.as_str()))
        .bind(req.client_id)
        .bind(req.limit)
        .bind(req.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[InvoiceStatus],
        next: InvoiceStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Invoice>> {
        let expected: Vec<&str> = expected.iter().map(|s| s.as_str()).collect();
        let row = sqlx::query(&format!(
            "UPDATE invoice i
             SET status = $2,
                 sent_at = CASE WHEN $2 = 'sent' THEN $4 ELSE i.sent_at END,
                 paid_at = CASE WHEN $2 = 'paid' THEN $4 ELSE i.paid_at END,
                 updated_at = $4
             WHERE i.id = $1 AND i.status = ANY($3)
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(id)
        .bind(next.as_str())
        .bind(&expected)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn mark_overdue(&self, today: NaiveDate) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE invoice SET status = 'overdue', updated_at = now()
             WHERE status = 'sent' AND due_date < $1",
        )
        .bind(today)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn list_reminder_candidates(&self, today: NaiveDate) -> Result<Vec<ReminderCandidate>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS}, c.name AS client_name, c.email AS client_email
             FROM invoice i
             JOIN client c ON c.id = i.client_id
             WHERE i.status IN ('sent', 'overdue') AND i.due_date < $1
             ORDER BY i.due_date ASC, i.id ASC"
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_candidate).collect()
    }

    async fn reminder_candidate(&self, id: Uuid) -> Result<Option<ReminderCandidate>> {
        let row = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS}, c.name AS client_name, c.email AS client_email
             FROM invoice i
             JOIN client c ON c.id = i.client_id
             WHERE i.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_candidate).transpose()
    }

    async fn count_created_since(&self, owner_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoice WHERE owner_id = $1 AND created_at >= $2",
        )
        .bind(owner_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    async fn set_checkout_session(&self, id: Uuid, session_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE invoice SET checkout_session_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::InvoiceNotFound(id));
        }
        Ok(())
    }

    async fn find_by_checkout_session(&self, session_id: &str) -> Result<Option<Invoice>> {
        let row = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoice i WHERE i.checkout_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_numbers_are_zero_padded() {
        assert_eq!(DocumentKind::Invoice.format(1), "INV-0001");
        assert_eq!(DocumentKind::Estimate.format(42), "EST-0042");
        assert_eq!(DocumentKind::Invoice.format(12345), "INV-12345");
    }

    #[test]
    fn test_invoice_columns_are_qualified() {
        for column in INVOICE_COLUMNS.split(',') {
            assert!(column.trim().starts_with("i."), "unqualified column {column}");
        }
    }
}
