//! Reminder email rendering and hand-off to the email provider.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::defaults;
use crate::error::Result;
use crate::models::{BusinessProfile, OutboundEmail, ReminderCandidate, ReminderTier};
use crate::traits::EmailProvider;

const FALLBACK_SENDER_NAME: &str = "Tally";

/// Escape text for interpolation into HTML.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Format minor units as `"USD 1,234.56"`.
pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let whole = (abs / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{} {}{}.{:02}", currency, sign, grouped, abs % 100)
}

fn subject(tier: ReminderTier, invoice_number: &str, sender: &str) -> String {
    match tier {
        ReminderTier::Friendly => {
            format!("Friendly reminder: invoice {} from {}", invoice_number, sender)
        }
        ReminderTier::Polite => format!("Invoice {} from {} is past due", invoice_number, sender),
        ReminderTier::Firm => {
            format!("Payment overdue: invoice {} from {}", invoice_number, sender)
        }
        ReminderTier::Urgent => format!(
            "Urgent: invoice {} from {} is seriously overdue",
            invoice_number, sender
        ),
    }
}

fn opening(tier: ReminderTier, days: i64) -> String {
    let day_word = if days == 1 { "day" } else { "days" };
    match tier {
        ReminderTier::Friendly => format!(
            "Just a quick note that the invoice below was due {} {} ago. If you've already paid, \
             thank you and please ignore this message.",
            days, day_word
        ),
        ReminderTier::Polite => format!(
            "Our records show the invoice below is now {} {} past due. We'd appreciate payment \
             at your earliest convenience.",
            days, day_word
        ),
        ReminderTier::Firm => format!(
            "The invoice below is {} {} overdue. Please arrange payment \
             promptly or let us know if there is a problem.",
            days, day_word
        ),
        ReminderTier::Urgent => format!(
            "The invoice below is {} {} overdue and requires immediate attention. Please settle \
             the balance as soon as possible.",
            days, day_word
        ),
    }
}

/// Render the subject and HTML body of a reminder email.
pub fn render(
    tier: ReminderTier,
    candidate: &ReminderCandidate,
    profile: Option<&BusinessProfile>,
    overdue_days: i64,
) -> (String, String) {
    let invoice = &candidate.invoice;
    let sender = profile
        .map(|p| p.business_name.as_str())
        .unwrap_or(FALLBACK_SENDER_NAME);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html><html><body>");
    html.push_str(&format!("<p>Hi {},</p>", html_escape(&candidate.client_name)));
    html.push_str(&format!("<p>{}</p>", html_escape(&opening(tier, overdue_days))));
    html.push_str("<table>");
    html.push_str(&format!(
        "<tr><td>Invoice</td><td>{}</td></tr>",
        html_escape(&invoice.invoice_number)
    ));
    html.push_str(&format!(
        "<tr><td>Amount due</td><td>{}</td></tr>",
        html_escape(&format_money(invoice.total_cents, &invoice.currency))
    ));
    html.push_str(&format!(
        "<tr><td>Due date</td><td>{}</td></tr>",
        invoice.due_date.format("%Y-%m-%d")
    ));
    html.push_str("</table>");
    if let Some(instructions) = profile.and_then(|p| p.payment_instructions.as_deref()) {
        html.push_str(&format!("<p>{}</p>", html_escape(instructions)));
    }
    html.push_str(&format!("<p>Thank you,<br>{}</p>", html_escape(sender)));
    if let Some(p) = profile {
        html.push_str(&format!(
            "<p><small>{}</small></p>",
            html_escape(&p.email)
        ));
    }
    html.push_str("</body></html>");

    (subject(tier, &invoice.invoice_number, sender), html)
}

/// Sends rendered reminders through an [`EmailProvider`].
#[derive(Clone)]
pub struct ReminderDispatcher {
    provider: Arc<dyn EmailProvider>,
    from_address: String,
}

impl ReminderDispatcher {
    pub fn new(provider: Arc<dyn EmailProvider>) -> Self {
        Self {
            provider,
            from_address: defaults::EMAIL_FROM.to_string(),
        }
    }

    pub fn with_from_address(mut self, from: impl Into<String>) -> Self {
        self.from_address = from.into();
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Build the outbound message without sending it.
    pub fn compose(
        &self,
        tier: ReminderTier,
        candidate: &ReminderCandidate,
        profile: Option<&BusinessProfile>,
        overdue_days: i64,
    ) -> OutboundEmail {
        let (subject, html) = render(tier, candidate, profile, overdue_days);
        let from = match profile {
            Some(p) => format!(
                "{} <{}>",
                p.business_name.replace(['<', '>', '"'], ""),
                self.from_address
            ),
            None => self.from_address.clone(),
        };
        OutboundEmail {
            from,
            to: candidate.client_email.clone(),
            subject,
            html,
        }
    }

    /// Send a reminder; returns the provider message id.
    pub async fn dispatch(
        &self,
        tier: ReminderTier,
        candidate: &ReminderCandidate,
        profile: Option<&BusinessProfile>,
        overdue_days: i64,
    ) -> Result<String> {
        let email = self.compose(tier, candidate, profile, overdue_days);
        match self.provider.send(&email).await {
            Ok(message_id) => {
                debug!(
                    subsystem = "reminders",
                    component = "dispatch",
                    invoice_id = %candidate.invoice.id,
                    tier = %tier,
                    message_id = %message_id,
                    provider = self.provider.name(),
                    "Reminder handed to email provider"
                );
                Ok(message_id)
            }
            Err(e) => {
                warn!(
                    subsystem = "reminders",
                    component = "dispatch",
                    invoice_id = %candidate.invoice.id,
                    tier = %tier,
                    provider = self.provider.name(),
                    error = %e,
                    "Reminder send failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{sample_candidate, RecordingEmailProvider};
    use chrono::Utc;
    use uuid::Uuid;

    fn profile() -> BusinessProfile {
        BusinessProfile {
            owner_id: Uuid::new_v4(),
            business_name: "Ada & Co".into(),
            email: "ada@example.com".into(),
            phone: None,
            address: None,
            payment_instructions: Some("Wire to IBAN <redacted>".into()),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0, "USD"), "USD 0.00");
        assert_eq!(format_money(5, "EUR"), "EUR 0.05");
        assert_eq!(format_money(123_456_789, "USD"), "USD 1,234,567.89");
        assert_eq!(format_money(100_000, "GBP"), "GBP 1,000.00");
        assert_eq!(format_money(-2_550, "USD"), "USD -25.50");
    }

    #[test]
    fn test_render_escapes_interpolated_values() {
        let mut candidate = sample_candidate(10);
        candidate.client_name = "<b>Bob</b>".into();
        let (subject, html) = render(ReminderTier::Firm, &candidate, Some(&profile()), 10);

        assert!(subject.starts_with("Payment overdue"));
        assert!(subject.contains("Ada & Co"));
        assert!(html.contains("Hi &lt;b&gt;Bob&lt;/b&gt;,"));
        assert!(html.contains("Ada &amp; Co"));
        assert!(html.contains("IBAN &lt;redacted&gt;"));
        assert!(html.contains("10 days overdue"));
        assert!(!html.contains("<b>Bob</b>"));
    }

    #[test]
    fn test_subject_varies_by_tier() {
        let candidate = sample_candidate(1);
        let subjects: Vec<String> = ReminderTier::ALL
            .iter()
            .map(|t| render(*t, &candidate, None, 1).0)
            .collect();
        for (i, a) in subjects.iter().enumerate() {
            for b in subjects.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(subjects[0].contains("Tally"));
    }

    #[tokio::test]
    async fn test_dispatch_sends_to_client() {
        let provider = Arc::new(RecordingEmailProvider::new());
        let dispatcher =
            ReminderDispatcher::new(provider.clone()).with_from_address("billing@example.com");
        let candidate = sample_candidate(3);

        let id = dispatcher
            .dispatch(ReminderTier::Friendly, &candidate, Some(&profile()), 3)
            .await
            .unwrap();

        let sent = provider.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, candidate.client_email);
        assert_eq!(sent[0].from, "Ada & Co <billing@example.com>");
        assert!(id.starts_with("msg_"));
    }

    #[tokio::test]
    async fn test_dispatch_propagates_failure() {
        let provider = Arc::new(RecordingEmailProvider::failing("mailbox unavailable"));
        let dispatcher = ReminderDispatcher::new(provider);
        let err = dispatcher
            .dispatch(ReminderTier::Urgent, &sample_candidate(20), None, 20)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mailbox unavailable"));
    }
}
