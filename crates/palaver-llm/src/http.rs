//! Shared HTTP plumbing for vendor adapters: non-2xx error mapping and a
//! bounded retry-with-backoff policy for transient failures.
//!
//! The retry policy covers HTTP 429/500/502/504/503 and connect/timeout
//! transport errors only; everything else surfaces immediately. A vendor's
//! `Retry-After` hint is honored when it exceeds the computed backoff.

use std::time::Duration;

use tracing::warn;

use crate::error::{AdapterError, Result};
use crate::vendor::VendorId;

/// Transient failures are retried at most this many times per call.
pub(crate) const MAX_TRANSIENT_RETRIES: u32 = 2;
const BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(8);
const JITTER_FRACTION: f64 = 0.25;

/// Whether an HTTP status is worth a bounded retry.
pub(crate) fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Delay for attempt `n` (0-indexed): `min(base * 2^n, cap)` plus jitter.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let base_ms = BASE_DELAY.as_millis() as u64;
    let capped_ms = base_ms
        .saturating_mul(exp)
        .min(MAX_DELAY.as_millis() as u64);

    let jitter_max_ms = (capped_ms as f64 * JITTER_FRACTION) as u64;
    let jitter_ms = if jitter_max_ms > 0 {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u64;
        seed % (jitter_max_ms + 1)
    } else {
        0
    };

    Duration::from_millis(capped_ms + jitter_ms)
}

/// Send a request, retrying transient failures with exponential backoff.
///
/// Returns the response only when it is 2xx; every other outcome is mapped
/// into the error taxonomy via [`error_from_response`]. The builder must be
/// replayable (JSON bodies are; streaming bodies are not).
pub(crate) async fn send_retrying(
    vendor: VendorId,
    builder: reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    let mut attempt = 0u32;
    loop {
        let request = builder.try_clone().ok_or_else(|| AdapterError::Upstream {
            vendor,
            status: None,
            message: "request body is not replayable".into(),
        })?;

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let code = status.as_u16();
                if is_transient_status(code) && attempt < MAX_TRANSIENT_RETRIES {
                    let suggested = retry_after_ms(&response).map(Duration::from_millis);
                    let delay = match suggested {
                        Some(s) => backoff_delay(attempt).max(s),
                        None => backoff_delay(attempt),
                    };
                    warn!(
                        vendor = %vendor,
                        status = code,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient vendor error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                return Err(error_from_response(vendor, response).await);
            }
            Err(err) => {
                if (err.is_connect() || err.is_timeout()) && attempt < MAX_TRANSIENT_RETRIES {
                    let delay = backoff_delay(attempt);
                    warn!(
                        vendor = %vendor,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transport error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(AdapterError::Http(err));
            }
        }
    }
}

/// Map a non-2xx response into the error taxonomy, consuming the body so
/// diagnostics carry the vendor's own error text.
pub(crate) async fn error_from_response(
    vendor: VendorId,
    response: reqwest::Response,
) -> AdapterError {
    let status = response.status().as_u16();

    if status == 429 {
        let header_ms = retry_after_ms(&response);
        let body = response.text().await.unwrap_or_default();
        let retry_after_ms = header_ms
            .or_else(|| retry_after_ms_from_body(&body))
            .unwrap_or(1000);
        return AdapterError::RateLimited {
            vendor,
            retry_after_ms,
        };
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        extract_error_message(&body).unwrap_or(body)
    };

    AdapterError::Upstream {
        vendor,
        status: Some(status),
        message,
    }
}

/// Extract a human-readable message from a vendor JSON error body.
/// Handles `{"error": {"message": "..."}}` and `{"error": "..."}`.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error").and_then(|v| {
        v.get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .or_else(|| v.as_str().map(String::from))
    })
}

/// Read a `Retry-After`-style hint from response headers, in milliseconds.
/// Only the numeric-seconds form is handled; HTTP-dates are rare for APIs.
fn retry_after_ms(response: &reqwest::Response) -> Option<u64> {
    let value = response
        .headers()
        .get("retry-after")
        .or_else(|| response.headers().get("x-ratelimit-reset-after"))
        .and_then(|v| v.to_str().ok())?;
    value
        .parse::<f64>()
        .ok()
        .map(|secs| (secs * 1000.0).max(0.0) as u64)
}

/// Read a retry hint from a JSON error body (`retry_after_ms` or seconds
/// under `retry_after`).
fn retry_after_ms_from_body(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("retry_after_ms")
        .and_then(|v| v.as_u64())
        .or_else(|| {
            value
                .get("retry_after")
                .and_then(|v| v.as_f64())
                .map(|secs| (secs * 1000.0) as u64)
        })
}
