//! Request validation and normalization.
//!
//! Turns API request bodies into the validated `New*` records repositories
//! insert. All failures are `Error::InvalidInput`.

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::{
    CreateClientRequest, CreateEstimateRequest, CreateInvoiceRequest, DocumentTotals, Estimate,
    LineItem, NewEstimate, NewInvoice, UpdateClientRequest, UpsertProfileRequest,
};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

static CURRENCY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{3}$").expect("currency pattern compiles")
});

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidInput(msg.into())
}

/// Trimmed, non-empty required text.
pub fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Trimmed optional text; blank becomes `None`.
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate and lowercase an email address.
pub fn validate_email(value: &str) -> Result<String> {
    let email = value.trim();
    if !EMAIL_PATTERN.is_match(email) {
        return Err(invalid(format!("'{}' is not a valid email address", email)));
    }
    Ok(email.to_ascii_lowercase())
}

/// Validate an ISO 4217 style code, defaulting when absent.
pub fn normalize_currency(value: Option<&str>) -> Result<String> {
    let code = value
        .map(|v| v.trim().to_ascii_uppercase())
        .unwrap_or_else(|| defaults::CURRENCY.to_string());
    if !CURRENCY_PATTERN.is_match(&code) {
        return Err(invalid(format!("'{}' is not a 3-letter currency code", code)));
    }
    Ok(code)
}

pub fn validate_tax_rate(bps: Option<i32>) -> Result<i32> {
    let bps = bps.unwrap_or(0);
    if !(0..=defaults::MAX_TAX_BPS).contains(&bps) {
        return Err(invalid(format!(
            "tax_rate_bps must be between 0 and {}",
            defaults::MAX_TAX_BPS
        )));
    }
    Ok(bps)
}

/// Validate line items and trim their descriptions.
pub fn validate_line_items(items: Vec<LineItem>) -> Result<Vec<LineItem>> {
    if items.is_empty() {
        return Err(invalid("at least one line item is required"));
    }
    if items.len() > defaults::MAX_LINE_ITEMS {
        return Err(invalid(format!(
            "at most {} line items are allowed",
            defaults::MAX_LINE_ITEMS
        )));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let description =
                require_text(&format!("line_items[{}].description", i), &item.description)?;
            if item.quantity <= 0 {
                return Err(invalid(format!("line_items[{}].quantity must be positive", i)));
            }
            if item.unit_price_cents < 0 {
                return Err(invalid(format!(
                    "line_items[{}].unit_price_cents must not be negative",
                    i
                )));
            }
            if item.quantity.checked_mul(item.unit_price_cents).is_none() {
                return Err(invalid(format!("line_items[{}] amount is too large", i)));
            }
            Ok(LineItem {
                description,
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
            })
        })
        .collect()
}

pub fn prepare_client(req: CreateClientRequest) -> Result<CreateClientRequest> {
    Ok(CreateClientRequest {
        name: require_text("name", &req.name)?,
        email: validate_email(&req.email)?,
        company: optional_text(req.company),
        address: optional_text(req.address),
    })
}

pub fn prepare_client_update(req: UpdateClientRequest) -> Result<UpdateClientRequest> {
    Ok(UpdateClientRequest {
        name: req.name.as_deref().map(|n| require_text("name", n)).transpose()?,
        email: req.email.as_deref().map(validate_email).transpose()?,
        company: req.company.map(|c| c.trim().to_string()),
        address: req.address.map(|a| a.trim().to_string()),
    })
}

pub fn prepare_profile(req: UpsertProfileRequest) -> Result<UpsertProfileRequest> {
    Ok(UpsertProfileRequest {
        business_name: require_text("business_name", &req.business_name)?,
        email: validate_email(&req.email)?,
        phone: optional_text(req.phone),
        address: optional_text(req.address),
        payment_instructions: optional_text(req.payment_instructions),
    })
}

/// Validate an invoice request and compute its totals.
///
/// Missing issue date defaults to `today`; missing due date to the issue
/// date plus the default payment terms.
pub fn prepare_invoice(
    owner_id: Uuid,
    req: CreateInvoiceRequest,
    today: NaiveDate,
) -> Result<NewInvoice> {
    let issue_date = req.issue_date.unwrap_or(today);
    let due_date = req
        .due_date
        .unwrap_or(issue_date + Duration::days(defaults::PAYMENT_TERMS_DAYS));
    if due_date < issue_date {
        return Err(invalid("due_date must not be before issue_date"));
    }
    let line_items = validate_line_items(req.line_items)?;
    let tax_rate_bps = validate_tax_rate(req.tax_rate_bps)?;
    let totals = DocumentTotals::compute(&line_items, tax_rate_bps)?;

    Ok(NewInvoice {
        owner_id,
        client_id: req.client_id,
        currency: normalize_currency(req.currency.as_deref())?,
        issue_date,
        due_date,
        line_items,
        tax_rate_bps,
        totals,
        notes: optional_text(req.notes),
    })
}

pub fn prepare_estimate(
    owner_id: Uuid,
    req: CreateEstimateRequest,
    today: NaiveDate,
) -> Result<NewEstimate> {
    let issue_date = req.issue_date.unwrap_or(today);
    if let Some(valid_until) = req.valid_until {
        if valid_until < issue_date {
            return Err(invalid("valid_until must not be before issue_date"));
        }
    }
    let line_items = validate_line_items(req.line_items)?;
    let tax_rate_bps = validate_tax_rate(req.tax_rate_bps)?;
    let totals = DocumentTotals::compute(&line_items, tax_rate_bps)?;

    Ok(NewEstimate {
        owner_id,
        client_id: req.client_id,
        currency: normalize_currency(req.currency.as_deref())?,
        issue_date,
        valid_until: req.valid_until,
        line_items,
        tax_rate_bps,
        totals,
        notes: optional_text(req.notes),
    })
}

/// Draft invoice carrying over an estimate's lines, tax and notes.
pub fn invoice_from_estimate(estimate: &Estimate, today: NaiveDate) -> Result<NewInvoice> {
    Ok(NewInvoice {
        owner_id: estimate.owner_id,
        client_id: estimate.client_id,
        currency: estimate.currency.clone(),
        issue_date: today,
        due_date: today + Duration::days(defaults::PAYMENT_TERMS_DAYS),
        line_items: estimate.line_items.clone(),
        tax_rate_bps: estimate.tax_rate_bps,
        totals: DocumentTotals::compute(&estimate.line_items, estimate.tax_rate_bps)?,
        notes: estimate.notes.clone(),
    })
}

/// Clamp list paging to sane bounds.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit
        .unwrap_or(defaults::PAGE_LIMIT)
        .clamp(1, defaults::PAGE_LIMIT_MAX);
    (limit, offset.unwrap_or(0).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    fn line(description: &str, quantity: i64, unit: i64) -> LineItem {
        LineItem {
            description: description.into(),
            quantity,
            unit_price_cents: unit,
        }
    }

    fn invoice_req() -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            client_id: Uuid::new_v4(),
            line_items: vec![line("  Logo design ", 1, 50_000)],
            tax_rate_bps: Some(2_000),
            currency: Some("eur".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_email_validation() {
        assert_eq!(validate_email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(validate_email("user+tag@sub.example.co.uk").is_ok());
        for bad in ["", "no-at-sign", "a@b", "a@@b.com", "spaces in@x.com"] {
            assert!(validate_email(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_currency() {
        assert_eq!(normalize_currency(None).unwrap(), "USD");
        assert_eq!(normalize_currency(Some(" gbp ")).unwrap(), "GBP");
        assert!(normalize_currency(Some("EURO")).is_err());
        assert!(normalize_currency(Some("E1R")).is_err());
    }

    #[test]
    fn test_prepare_invoice_defaults_and_totals() {
        let new = prepare_invoice(Uuid::new_v4(), invoice_req(), today()).unwrap();
        assert_eq!(new.issue_date, today());
        assert_eq!(new.due_date, today() + Duration::days(30));
        assert_eq!(new.currency, "EUR");
        assert_eq!(new.line_items[0].description, "Logo design");
        assert_eq!(new.totals.subtotal_cents, 50_000);
        assert_eq!(new.totals.tax_cents, 10_000);
        assert_eq!(new.totals.total_cents, 60_000);
    }

    #[test]
    fn test_prepare_invoice_rejections() {
        let mut req = invoice_req();
        req.line_items.clear();
        assert!(prepare_invoice(Uuid::new_v4(), req, today()).is_err());

        let mut req = invoice_req();
        req.line_items = vec![line("x", 0, 100)];
        assert!(prepare_invoice(Uuid::new_v4(), req, today()).is_err());

        let mut req = invoice_req();
        req.line_items = vec![line("x", 1, -1)];
        assert!(prepare_invoice(Uuid::new_v4(), req, today()).is_err());

        let mut req = invoice_req();
        req.line_items = vec![line("   ", 1, 1)];
        assert!(prepare_invoice(Uuid::new_v4(), req, today()).is_err());

        let mut req = invoice_req();
        req.tax_rate_bps = Some(10_001);
        assert!(prepare_invoice(Uuid::new_v4(), req, today()).is_err());

        let mut req = invoice_req();
        req.issue_date = Some(today());
        req.due_date = Some(today() - Duration::days(1));
        let err = prepare_invoice(Uuid::new_v4(), req, today()).unwrap_err();
        assert!(err.to_string().contains("due_date"));
    }

    #[test]
    fn test_overflowing_totals_are_invalid_input() {
        let mut req = invoice_req();
        req.line_items = vec![line("Retainer", 1, 1_000_000_000_000_000)];
        req.tax_rate_bps = Some(10_000);
        let new = prepare_invoice(Uuid::new_v4(), req, today()).unwrap();
        assert_eq!(new.totals.total_cents, 2_000_000_000_000_000);

        let half = i64::MAX / 2 + 1;
        let mut req = invoice_req();
        req.line_items = vec![line("Phase 1", 1, half), line("Phase 2", 1, half)];
        let err = prepare_invoice(Uuid::new_v4(), req, today()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = prepare_estimate(
            Uuid::new_v4(),
            CreateEstimateRequest {
                client_id: Uuid::new_v4(),
                line_items: vec![line("Build", 1, i64::MAX / 2)],
                tax_rate_bps: Some(10_000),
                ..Default::default()
            },
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_prepare_client_trims_and_drops_blanks() {
        let req = prepare_client(CreateClientRequest {
            name: "  Bob ".into(),
            email: "BOB@example.com".into(),
            company: Some("   ".into()),
            address: None,
        })
        .unwrap();
        assert_eq!(req.name, "Bob");
        assert_eq!(req.email, "bob@example.com");
        assert_eq!(req.company, None);

        assert!(prepare_client(CreateClientRequest {
            name: "".into(),
            email: "bob@example.com".into(),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_prepare_estimate_valid_until() {
        let req = CreateEstimateRequest {
            client_id: Uuid::new_v4(),
            line_items: vec![line("Audit", 2, 7_500)],
            valid_until: Some(today() - Duration::days(1)),
            issue_date: Some(today()),
            ..Default::default()
        };
        assert!(prepare_estimate(Uuid::new_v4(), req, today()).is_err());
    }

    #[test]
    fn test_page_clamps() {
        assert_eq!(page(None, None), (50, 0));
        assert_eq!(page(Some(0), Some(-3)), (1, 0));
        assert_eq!(page(Some(10_000), Some(20)), (500, 20));
    }
}
