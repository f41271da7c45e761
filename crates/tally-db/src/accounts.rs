//! Account repository: business profile, subscription plan and purge.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::{info, warn};
use uuid::Uuid;

use tally_core::{
    AccountRepository, BusinessProfile, Error, Plan, PurgeReport, Result, TablePurge,
    UpsertProfileRequest,
};

/// Tables cleared by [`PgAccountRepository::purge`], children before parents.
pub const PURGE_TABLES: [&str; 7] = [
    "reminder",
    "invoice",
    "estimate",
    "client",
    "document_counter",
    "business_profile",
    "subscription",
];

/// PostgreSQL implementation of AccountRepository.
pub struct PgAccountRepository {
    pool: Pool<Postgres>,
}

impl PgAccountRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_profile(row: sqlx::postgres::PgRow) -> BusinessProfile {
        BusinessProfile {
            owner_id: row.get("owner_id"),
            business_name: row.get("business_name"),
            email: row.get("email"),
            phone: row.get("phone"),
            address: row.get("address"),
            payment_instructions: row.get("payment_instructions"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Set an account's plan. Used by billing webhooks and fixtures.
    pub async fn set_plan(&self, owner_id: Uuid, plan: Plan) -> Result<()> {
        sqlx::query(
            "INSERT INTO subscription (owner_id, plan, status, updated_at)
             VALUES ($1, $2, 'active', now())
             ON CONFLICT (owner_id) DO UPDATE SET plan = EXCLUDED.plan, updated_at = now()",
        )
        .bind(owner_id)
        .bind(plan.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn purge_table(&self, table: &str, owner_id: Uuid) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE owner_id = $1"))
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn get_profile(&self, owner_id: Uuid) -> Result<Option<BusinessProfile>> {
        let row = sqlx::query(
            "SELECT owner_id, business_name, email, phone, address, payment_instructions, updated_at
             FROM business_profile WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_profile))
    }

    async fn upsert_profile(
        &self,
        owner_id: Uuid,
        req: UpsertProfileRequest,
    ) -> Result<BusinessProfile> {
        let row = sqlx::query(
            "INSERT INTO business_profile
                 (owner_id, business_name, email, phone, address, payment_instructions, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (owner_id) DO UPDATE SET
                 business_name = EXCLUDED.business_name,
                 email = EXCLUDED.email,
                 phone = EXCLUDED.phone,
                 address = EXCLUDED.address,
                 payment_instructions = EXCLUDED.payment_instructions,
                 updated_at = EXCLUDED.updated_at
             RETURNING owner_id, business_name, email, phone, address, payment_instructions,
                       updated_at",
        )
        .bind(owner_id)
        .bind(&req.business_name)
        .bind(&req.email)
        .bind(&req.phone)
        .bind(&req.address)
        .bind(&req.payment_instructions)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_profile(row))
    }

    async fn get_plan(&self, owner_id: Uuid) -> Result<Plan> {
        let plan: Option<String> =
            sqlx::query_scalar("SELECT plan FROM subscription WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        match plan {
            Some(plan) => plan.parse(),
            None => Ok(Plan::Free),
        }
    }

    async fn purge(&self, owner_id: Uuid) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();

        for table in PURGE_TABLES {
            match self.purge_table(table, owner_id).await {
                Ok(deleted) => report.tables.push(TablePurge {
                    table: table.to_string(),
                    deleted,
                }),
                Err(e) if e.is_undefined_table() => {
                    warn!(
                        subsystem = "db",
                        component = "accounts",
                        op = "purge",
                        table,
                        "Table missing, skipping"
                    );
                    report.skipped_tables.push(table.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            subsystem = "db",
            component = "accounts",
            op = "purge",
            owner_id = %owner_id,
            deleted = report.total_deleted(),
            skipped = report.skipped_tables.len(),
            "Account purged"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_order_deletes_children_first() {
        let pos = |t: &str| PURGE_TABLES.iter().position(|x| *x == t).unwrap();
        assert!(pos("reminder") < pos("invoice"));
        assert!(pos("invoice") < pos("client"));
        assert!(pos("estimate") < pos("client"));
    }
}
