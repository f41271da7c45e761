//! Subscription plan limits.
//!
//! Limits are checked against usage counted from the store at request time.

use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::{Plan, Usage};
use crate::traits::{AccountRepository, ClientRepository, InvoiceRepository};

/// A write gated by the account's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitAction {
    CreateClient,
    CreateInvoice,
    AutomatedReminder,
}

/// What a plan allows. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub max_clients: Option<i64>,
    pub max_invoices_per_month: Option<i64>,
    pub automated_reminders: bool,
}

impl PlanLimits {
    pub fn for_plan(plan: Plan) -> Self {
        match plan {
            Plan::Free => Self {
                max_clients: Some(i64::from(defaults::FREE_PLAN_MAX_CLIENTS)),
                max_invoices_per_month: Some(i64::from(defaults::FREE_PLAN_MAX_INVOICES_PER_MONTH)),
                automated_reminders: false,
            },
            Plan::Pro => Self {
                max_clients: None,
                max_invoices_per_month: None,
                automated_reminders: true,
            },
        }
    }

    /// Check whether `action` fits within these limits given current `usage`.
    pub fn check(&self, action: LimitAction, usage: &Usage) -> Result<()> {
        match action {
            LimitAction::CreateClient => match self.max_clients {
                Some(max) if usage.clients >= max => Err(Error::LimitExceeded(format!(
                    "client limit of {} reached; upgrade to add more clients",
                    max
                ))),
                _ => Ok(()),
            },
            LimitAction::CreateInvoice => match self.max_invoices_per_month {
                Some(max) if usage.invoices_this_month >= max => Err(Error::LimitExceeded(format!(
                    "monthly invoice limit of {} reached; upgrade to create more invoices",
                    max
                ))),
                _ => Ok(()),
            },
            LimitAction::AutomatedReminder if !self.automated_reminders => Err(
                Error::LimitExceeded("payment reminders require a paid plan".to_string()),
            ),
            LimitAction::AutomatedReminder => Ok(()),
        }
    }
}

/// First instant of the calendar month containing `now` (UTC).
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Plan, limits and usage for one account.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStatus {
    pub plan: Plan,
    pub limits: PlanLimits,
    pub usage: Usage,
}

/// Resolves plans and usage from repositories and gates writes.
#[derive(Clone)]
pub struct PlanEnforcer {
    accounts: Arc<dyn AccountRepository>,
    clients: Arc<dyn ClientRepository>,
    invoices: Arc<dyn InvoiceRepository>,
}

impl PlanEnforcer {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        clients: Arc<dyn ClientRepository>,
        invoices: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self {
            accounts,
            clients,
            invoices,
        }
    }

    pub async fn usage(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<Usage> {
        let clients = self.clients.count_for_owner(owner_id).await?;
        let invoices_this_month = self
            .invoices
            .count_created_since(owner_id, month_start(now))
            .await?;
        Ok(Usage {
            clients,
            invoices_this_month,
        })
    }

    pub async fn status(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<PlanStatus> {
        let plan = self.accounts.get_plan(owner_id).await?;
        Ok(PlanStatus {
            plan,
            limits: PlanLimits::for_plan(plan),
            usage: self.usage(owner_id, now).await?,
        })
    }

    /// Fail with `Error::LimitExceeded` unless the owner's plan allows `action`.
    pub async fn ensure_allowed(
        &self,
        owner_id: Uuid,
        action: LimitAction,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let plan = self.accounts.get_plan(owner_id).await?;
        let limits = PlanLimits::for_plan(plan);
        // Reminder gating needs no usage counts.
        let usage = match action {
            LimitAction::AutomatedReminder => Usage::default(),
            _ => self.usage(owner_id, now).await?,
        };
        let outcome = limits.check(action, &usage);
        debug!(
            subsystem = "limits",
            owner_id = %owner_id,
            plan = %plan,
            action = ?action,
            allowed = outcome.is_ok(),
            "Plan check"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::models::CreateClientRequest;

    #[test]
    fn test_free_plan_limits() {
        let limits = PlanLimits::for_plan(Plan::Free);
        let under = Usage {
            clients: 2,
            invoices_this_month: 4,
        };
        assert!(limits.check(LimitAction::CreateClient, &under).is_ok());
        assert!(limits.check(LimitAction::CreateInvoice, &under).is_ok());

        let at_cap = Usage {
            clients: 3,
            invoices_this_month: 5,
        };
        assert!(matches!(
            limits.check(LimitAction::CreateClient, &at_cap),
            Err(Error::LimitExceeded(_))
        ));
        assert!(matches!(
            limits.check(LimitAction::CreateInvoice, &at_cap),
            Err(Error::LimitExceeded(_))
        ));
        assert!(matches!(
            limits.check(LimitAction::AutomatedReminder, &Usage::default()),
            Err(Error::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_pro_plan_unlimited() {
        let limits = PlanLimits::for_plan(Plan::Pro);
        let heavy = Usage {
            clients: 10_000,
            invoices_this_month: 10_000,
        };
        assert!(limits.check(LimitAction::CreateClient, &heavy).is_ok());
        assert!(limits.check(LimitAction::CreateInvoice, &heavy).is_ok());
        assert!(limits.check(LimitAction::AutomatedReminder, &heavy).is_ok());
    }

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2026, 2, 17, 13, 45, 9).unwrap();
        assert_eq!(
            month_start(now),
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_enforcer_counts_clients() {
        let store = Arc::new(InMemoryStore::new());
        let owner = Uuid::new_v4();
        let enforcer = PlanEnforcer::new(store.clone(), store.clone(), store.clone());

        for i in 0..3 {
            enforcer
                .ensure_allowed(owner, LimitAction::CreateClient, Utc::now())
                .await
                .unwrap();
            ClientRepository::insert(
                store.as_ref(),
                owner,
                CreateClientRequest {
                    name: format!("Client {}", i),
                    email: format!("c{}@example.com", i),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        let err = enforcer
            .ensure_allowed(owner, LimitAction::CreateClient, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LimitExceeded(_)));

        store.set_plan(owner, Plan::Pro);
        assert!(enforcer
            .ensure_allowed(owner, LimitAction::CreateClient, Utc::now())
            .await
            .is_ok());

        let status = enforcer.status(owner, Utc::now()).await.unwrap();
        assert_eq!(status.plan, Plan::Pro);
        assert_eq!(status.usage.clients, 3);
    }
}
