//! Webhook signature verification.
//!
//! Email webhooks carry `x-webhook-signature: sha256=<hex>` over the raw
//! body. Payment webhooks carry `Stripe-Signature: t=<unix>,v1=<hex>` over
//! `"{t}.{body}"`, rejected when the timestamp is outside the tolerance.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use tally_core::{defaults, Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age (either direction) of a payment webhook timestamp.
pub const SIGNATURE_TOLERANCE_SECS: i64 = defaults::WEBHOOK_TOLERANCE_SECS;

fn mac(secret: &str) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("Invalid webhook secret: {}", e)))
}

/// Hex HMAC-SHA256 of `payload` under `secret`.
pub fn sign_hex(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = mac(secret)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify_hex(secret: &str, payload: &[u8], signature_hex: &str) -> Result<bool> {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return Ok(false);
    };
    let mut mac = mac(secret)?;
    mac.update(payload);
    Ok(mac.verify_slice(&expected).is_ok())
}

/// Check an email webhook's `sha256=<hex>` header against the raw body.
pub fn verify_email_signature(secret: &str, body: &[u8], header: Option<&str>) -> Result<()> {
    let header = header.ok_or_else(|| Error::Unauthorized("missing webhook signature".into()))?;
    let signature = header.strip_prefix("sha256=").unwrap_or(header);
    if verify_hex(secret, body, signature)? {
        Ok(())
    } else {
        Err(Error::Unauthorized("invalid webhook signature".into()))
    }
}

/// Check a `Stripe-Signature` header.
///
/// Any of several `v1` entries may match (secret rotation).
pub fn verify_stripe_signature(
    secret: &str,
    body: &[u8],
    header: Option<&str>,
    now_unix: i64,
) -> Result<()> {
    let header = header.ok_or_else(|| Error::Unauthorized("missing Stripe-Signature".into()))?;

    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| Error::Unauthorized("signature has no timestamp".into()))?;
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(Error::Unauthorized("signature timestamp outside tolerance".into()));
    }

    let mut signed = format!("{}.", timestamp).into_bytes();
    signed.extend_from_slice(body);
    for candidate in candidates {
        if verify_hex(secret, &signed, candidate)? {
            return Ok(());
        }
    }
    Err(Error::Unauthorized("invalid payment webhook signature".into()))
}
