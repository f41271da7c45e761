//! Shared HTTP plumbing for provider clients.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use tally_core::{Error, Result};

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Error bodies seen from Resend (`{"message"}`) and Stripe (`{"error":{"message"}}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<NestedError>,
}

#[derive(Debug, Deserialize)]
struct NestedError {
    message: Option<String>,
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        Ok(ErrorBody {
            error: Some(NestedError {
                message: Some(message),
            }),
            ..
        }) => message,
        _ if body.trim().is_empty() => "no response body".to_string(),
        _ => body.chars().take(200).collect(),
    }
}

/// Map a non-success provider response to an error.
///
/// Auth failures are configuration problems; everything else is a provider error.
pub(crate) fn provider_error(provider: &str, status: StatusCode, body: &str) -> Error {
    let message = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Config(format!(
            "{} rejected credentials ({}): {}",
            provider, status, message
        )),
        _ => Error::Provider(format!("{} returned {}: {}", provider, status, message)),
    }
}
