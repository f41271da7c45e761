//! Reminder repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use tally_core::{
    new_v7, Error, NewReminder, Reminder, ReminderFilter, ReminderRepository, ReminderStatus,
    Result,
};

/// SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(PG_UNIQUE_VIOLATION))
}

const REMINDER_COLUMNS: &str = "id, invoice_id, owner_id, tier, status, provider_message_id, \
     failure_reason, created_at, sent_at, updated_at";

/// PostgreSQL implementation of ReminderRepository.
pub struct PgReminderRepository {
    pool: Pool<Postgres>,
}

impl PgReminderRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &sqlx::postgres::PgRow) -> Result<Reminder> {
        let tier: String = row.get("tier");
        let status: String = row.get("status");
        Ok(Reminder {
            id: row.get("id"),
            invoice_id: row.get("invoice_id"),
            owner_id: row.get("owner_id"),
            tier: tier.parse()?,
            status: status.parse()?,
            provider_message_id: row.get("provider_message_id"),
            failure_reason: row.get("failure_reason"),
            created_at: row.get("created_at"),
            sent_at: row.get("sent_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn blocking_statuses() -> Vec<&'static str> {
        ReminderStatus::BLOCKING.iter().map(|s| s.as_str()).collect()
    }
}

#[async_trait]
impl ReminderRepository for PgReminderRepository {
    async fn insert_if_absent(&self, reminder: NewReminder) -> Result<Option<Reminder>> {
        // The NOT EXISTS guard covers the common case; the partial unique index
        // on (invoice_id, tier) settles concurrent inserts that both pass it.
        let row = sqlx::query(&format!(
            "INSERT INTO reminder (id, invoice_id, owner_id, tier, status, created_at, updated_at)
             SELECT $1, $2, $3, $4, 'scheduled', $5, $5
             WHERE NOT EXISTS (
                 SELECT 1 FROM reminder
                 WHERE invoice_id = $2 AND tier = $4 AND status = ANY($6)
             )
             ON CONFLICT (invoice_id, tier) WHERE status IN ('scheduled', 'sent', 'delivered')
             DO NOTHING
             RETURNING {REMINDER_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(reminder.invoice_id)
        .bind(reminder.owner_id)
        .bind(reminder.tier.as_str())
        .bind(Utc::now())
        .bind(Self::blocking_statuses())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn list(&self, filter: ReminderFilter) -> Result<Vec<Reminder>> {
        let rows = sqlx::query(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminder
             WHERE ($1::uuid IS NULL OR owner_id = $1)
               AND ($2::uuid IS NULL OR invoice_id = $2)
               AND ($3::text IS NULL OR status = $3)
             ORDER BY created_at DESC, id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(filter.owner_id)
        .bind(filter.invoice_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn delete_ids(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM reminder WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn mark_sent(&self, id: Uuid, message_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE reminder
             SET status = 'sent', provider_message_id = $2, sent_at = $3, updated_at = $3,
                 failure_reason = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(message_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<()> {
        sqlx::query(
            "UPDATE reminder SET status = 'failed', failure_reason = $2, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn apply_delivery(
        &self,
        message_id: &str,
        status: ReminderStatus,
        reason: Option<&str>,
    ) -> Result<Option<Reminder>> {
        // A late event must not move a bounced or failed row back into a
        // blocking status while a newer row already holds that tier.
        let updated = sqlx::query(&format!(
            "UPDATE reminder r SET status = $2, failure_reason = $3, updated_at = now()
             WHERE r.provider_message_id = $1
               AND (NOT ($2 = ANY($4))
                    OR r.status = ANY($4)
                    OR NOT EXISTS (
                        SELECT 1 FROM reminder o
                        WHERE o.invoice_id = r.invoice_id
                          AND o.tier = r.tier
                          AND o.id <> r.id
                          AND o.status = ANY($4)))
             RETURNING {REMINDER_COLUMNS}"
        ))
        .bind(message_id)
        .bind(status.as_str())
        .bind(reason)
        .bind(Self::blocking_statuses())
        .fetch_optional(&self.pool)
        .await;

        match updated {
            Ok(Some(row)) => return Self::parse_row(&row).map(Some),
            Ok(None) => {}
            // A concurrent insert took the tier between the check and the write.
            Err(e) if is_unique_violation(&e) => {}
            Err(e) => return Err(Error::Database(e)),
        }

        let current = sqlx::query(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminder WHERE provider_message_id = $1"
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = &current {
            debug!(
                subsystem = "db",
                message_id,
                status = %status,
                "Delivery event superseded by a newer reminder; row left unchanged"
            );
            return Self::parse_row(row).map(Some);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_detection() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn test_blocking_statuses_match_partial_index() {
        // Must stay in sync with idx_reminder_blocking_tier.
        assert_eq!(
            PgReminderRepository::blocking_statuses(),
            vec!["scheduled", "sent", "delivered"]
        );
    }
}
