//! # tally-providers
//!
//! HTTP clients for the external services tally talks to:
//!
//! - [`ResendEmailProvider`]: reminder delivery through a Resend-compatible
//!   `POST /emails` API, plus parsing and verification of its delivery webhooks
//! - [`StripePaymentProvider`]: hosted checkout sessions through a
//!   Stripe-compatible API, plus `Stripe-Signature` verification
//!
//! # Example
//!
//! ```rust,no_run
//! use tally_core::{EmailProvider, OutboundEmail};
//! use tally_providers::{EmailConfig, ResendEmailProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = ResendEmailProvider::new(EmailConfig::from_env()).unwrap();
//!     let email = OutboundEmail {
//!         from: "billing@example.com".to_string(),
//!         to: "client@example.com".to_string(),
//!         subject: "Invoice INV-0001".to_string(),
//!         html: "<p>Hello</p>".to_string(),
//!     };
//!     let message_id = provider.send(&email).await.unwrap();
//! }
//! ```

pub mod email;
mod http;
pub mod payments;
pub mod signature;

// Re-export core types
pub use tally_core::*;

pub use email::{parse_delivery_event, EmailConfig, ResendEmailProvider};
pub use payments::{parse_payment_event, PaymentEvent, PaymentsConfig, StripePaymentProvider};
pub use signature::{
    sign_hex, verify_email_signature, verify_stripe_signature, SIGNATURE_TOLERANCE_SECS,
};
