//! Error types for the edgequake-license2table library.
//!
//! Four error types, one per failure scope:
//!
//! * [`ExtractError`]: **Fatal**: the batch cannot run at all (the input
//!   directory is missing or unreadable, the configuration is invalid, no API
//!   key was supplied). Returned as `Err(ExtractError)` from the top-level
//!   `extract*` functions, and always before any model call is made.
//!
//! * [`FileError`]: **Non-fatal**: one image failed (unreadable file, model
//!   call failed, response rejected, deadline hit). Stored inside
//!   [`crate::output::FileOutcome`] and surfaced as an all-sentinel row in the
//!   [`crate::output::ResultTable`]; the rest of the batch is unaffected.
//!
//! * [`ModelError`]: the typed failure of one model round-trip. The pipeline
//!   only asks it [`ModelError::is_retryable`] and wraps it in a
//!   [`FileError::Model`] once retries are exhausted.
//!
//! * [`ParseError`]: raised only by [`crate::pipeline::parse::UnknownLabelPolicy::Reject`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-license2table library.
///
/// Per-file failures use [`FileError`] and are stored in the result table
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input directory was not found at the given path.
    #[error("Image directory not found: '{path}'\nCheck the path exists.")]
    DirectoryNotFound { path: PathBuf },

    /// The input path exists but is a file, not a directory.
    #[error("'{path}' is not a directory\nPass the folder that contains the licence images.")]
    NotADirectory { path: PathBuf },

    /// Process does not have permission to list the directory.
    #[error("Permission denied listing '{path}'\nTry: chmod +rx {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Listing the directory failed for another reason.
    #[error("Failed to read directory '{path}': {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Model errors ──────────────────────────────────────────────────────
    /// No API key was configured for a provider that needs one.
    #[error("No API key configured for provider '{provider}'.\nSet OPENAI_API_KEY or pass --api-key.")]
    MissingApiKey { provider: String },

    /// The named provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// At least one file in the batch failed.
    ///
    /// Returned by [`crate::output::ExtractionOutput::into_result`] only; the
    /// eager entry points always return the table so failed rows stay visible.
    #[error("{failed}/{total} files failed during extraction")]
    PartialFailure { failed: usize, total: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output table file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image file.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum FileError {
    /// The file could not be opened or read.
    #[error("{file}: cannot read file: {detail}")]
    Io { file: String, detail: String },

    /// The file bytes are not a PNG or JPEG image.
    #[error("{file}: not a supported image ({detail})")]
    NotAnImage { file: String, detail: String },

    /// The model call failed after all retries.
    #[error("{file}: model call failed after {retries} retries: {cause}")]
    Model {
        file: String,
        retries: u32,
        cause: ModelError,
    },

    /// The response was rejected by the configured label policy.
    #[error("{file}: response rejected: {detail}")]
    Parse { file: String, detail: String },

    /// The batch deadline passed before this file finished.
    #[error("{file}: not finished before the {deadline_ms}ms batch deadline")]
    Timeout { file: String, deadline_ms: u64 },
}

impl FileError {
    /// Name of the file this error belongs to.
    pub fn file(&self) -> &str {
        match self {
            FileError::Io { file, .. }
            | FileError::NotAnImage { file, .. }
            | FileError::Model { file, .. }
            | FileError::Parse { file, .. }
            | FileError::Timeout { file, .. } => file,
        }
    }
}

/// Failure of a single request/response round-trip with the model.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ModelError {
    /// The call did not complete within the per-call timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// HTTP 401/403 or an equivalent provider error.
    #[error("authentication failed: {detail}")]
    Auth { detail: String },

    /// HTTP 429. `retry_after_secs` carries the server's `Retry-After` hint.
    #[error("rate limit exceeded{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// The provider refused the request itself: invalid input, context too
    /// long, unknown model. Sending it again gives the same answer.
    #[error("request rejected: {detail}")]
    Rejected { detail: String },

    /// The provider answered, but not with a usable completion.
    #[error("malformed response: {detail}")]
    Malformed { detail: String },

    /// Any other provider failure.
    #[error("API error{}: {message}", status_hint(.status))]
    Api { status: Option<u16>, message: String },
}

impl ModelError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Timeouts, rate limits, transport failures and 5xx responses are
    /// transient. Bad credentials, rejected requests and malformed payloads
    /// are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Timeout { .. } | ModelError::RateLimited { .. } => true,
            ModelError::Api { status, .. } => status.map_or(true, |s| s >= 500),
            ModelError::Auth { .. }
            | ModelError::Rejected { .. }
            | ModelError::Malformed { .. } => false,
        }
    }
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

fn status_hint(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

/// Rejection raised while parsing a response under the strict label policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A `label: value` line carried a label outside the recognised set.
    #[error("unrecognised label '{label}'")]
    UnknownLabel { label: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = ExtractError::PartialFailure {
            failed: 1,
            total: 10,
        };
        assert!(e.to_string().contains("1/10"), "got: {e}");
    }

    #[test]
    fn rate_limit_display_with_retry() {
        let e = ModelError::RateLimited {
            retry_after_secs: Some(60),
        };
        assert_eq!(e.to_string(), "rate limit exceeded (retry after 60s)");
    }

    #[test]
    fn rate_limit_display_without_retry() {
        let e = ModelError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(e.to_string(), "rate limit exceeded");
    }

    #[test]
    fn api_error_display_includes_status() {
        let e = ModelError::Api {
            status: Some(502),
            message: "bad gateway".into(),
        };
        assert!(e.to_string().contains("HTTP 502"));
        assert!(e.to_string().contains("bad gateway"));
    }

    #[test]
    fn retryable_classification() {
        assert!(ModelError::Timeout { secs: 60 }.is_retryable());
        assert!(ModelError::RateLimited {
            retry_after_secs: None
        }
        .is_retryable());
        assert!(ModelError::Api {
            status: Some(503),
            message: String::new()
        }
        .is_retryable());
        assert!(ModelError::Api {
            status: None,
            message: "connection reset".into()
        }
        .is_retryable());
        assert!(!ModelError::Api {
            status: Some(400),
            message: String::new()
        }
        .is_retryable());
        assert!(!ModelError::Auth {
            detail: "invalid key".into()
        }
        .is_retryable());
        assert!(!ModelError::Malformed {
            detail: "no choices".into()
        }
        .is_retryable());
        assert!(!ModelError::Rejected {
            detail: "context length exceeded".into()
        }
        .is_retryable());
    }

    #[test]
    fn file_error_reports_its_file() {
        let e = FileError::Model {
            file: "a.jpg".into(),
            retries: 3,
            cause: ModelError::Auth {
                detail: "invalid key".into(),
            },
        };
        assert_eq!(e.file(), "a.jpg");
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn missing_api_key_names_provider() {
        let e = ExtractError::MissingApiKey {
            provider: "openai".into(),
        };
        assert!(e.to_string().contains("openai"));
    }
}
