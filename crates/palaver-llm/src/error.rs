//! Error types for the adapter layer.
//!
//! All adapter operations return [`Result<T>`] which uses [`AdapterError`]
//! as the error type. Validation failures carry the complete list of
//! violated rules so a caller can surface all of them at once.

use thiserror::Error;

use crate::vendor::VendorId;

/// Errors produced by the vendor adapter layer.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The configuration failed one or more capability checks. Raised
    /// before any network call and never retried.
    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The vendor id does not map to a registered adapter.
    #[error("unsupported vendor: {0}")]
    UnsupportedVendor(String),

    /// The resolved adapter does not implement the requested operation
    /// (e.g. streaming on a unary-only vendor). Callers should fall back
    /// to the unary path.
    #[error("vendor {vendor} does not support {operation}")]
    UnsupportedOperation {
        vendor: VendorId,
        operation: &'static str,
    },

    /// The vendor HTTP call returned a non-2xx status or a body with no
    /// usable completion. Carries the raw body for diagnostics.
    #[error("vendor {vendor} request failed: {message}")]
    Upstream {
        vendor: VendorId,
        /// HTTP status, when the failure happened at the HTTP layer.
        status: Option<u16>,
        message: String,
    },

    /// The vendor returned a rate-limit response that survived the bounded
    /// retry policy.
    #[error("vendor {vendor} rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        vendor: VendorId,
        retry_after_ms: u64,
    },

    /// The vendor returned a body that could not be parsed into the
    /// expected shape.
    #[error("vendor {vendor} returned an invalid response: {message}")]
    InvalidResponse { vendor: VendorId, message: String },

    /// An HTTP-level error from reqwest.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdapterError {
    /// The HTTP status attached to this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            AdapterError::Upstream { status, .. } => *status,
            AdapterError::RateLimited { .. } => Some(429),
            AdapterError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A convenience type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
