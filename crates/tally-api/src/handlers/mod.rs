//! HTTP handlers, one module per resource.

pub mod account;
pub mod clients;
pub mod estimates;
pub mod health;
pub mod invoices;
pub mod jobs;
pub mod reminders;
pub mod webhooks;

use serde::Deserialize;

/// `?limit=&offset=` paging shared by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
