//! Error types for the VibrationVIEW client.
//!
//! This module defines the primary error type, `VvError`, together with the
//! structured failure reported by the remote endpoint (`RemoteError`) and the
//! normalized record every call site logs (`ErrorInfo`).
//!
//! ## Error Hierarchy
//!
//! `VvError` consolidates the failure sources of the crate:
//!
//! - **`NotConnected`**: The session never obtained a ready handle, or it has been
//!   closed. Every typed call on such a session fails fast with this variant.
//! - **`Remote`**: An individual automation call raised. The remote endpoint is the
//!   only place channel indices, thread affinity and file paths are validated, so
//!   precondition violations also arrive here.
//! - **`UnexpectedValue`**: The endpoint answered, but with a value whose shape does
//!   not match the member's contract (e.g. a string where a count was expected).
//! - **`Config`** / **`Io`**: Ambient failures from configuration loading and the
//!   harness result log.
//!
//! ## Normalization
//!
//! [`ErrorInfo::extract`] turns any error into a `(message, code, source)` triple.
//! It never fails: when no `RemoteError` can be found in the source chain it falls
//! back to the error's display text.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, VvError>;

/// Result of a raw endpoint call.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Source component reported when a failure carries no structured origin.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Failure raised by the remote automation endpoint.
///
/// Mirrors the exception record an automation server fills in: a numeric status
/// code (HRESULT-style), the component that raised it and a description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{description} (code {code:#010x}, source {source_component})")]
pub struct RemoteError {
    /// Status code reported by the endpoint
    pub code: i32,
    /// Component that raised the failure
    pub source_component: String,
    /// Human readable description
    pub description: String,
}

impl RemoteError {
    /// Create a remote error from its parts.
    pub fn new(code: i32, source: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code,
            source_component: source.into(),
            description: description.into(),
        }
    }
}

/// Errors surfaced by the typed call surface.
#[derive(Error, Debug)]
pub enum VvError {
    #[error("VibrationVIEW session is not connected")]
    NotConnected,

    #[error("Remote call {member} failed: {error}")]
    Remote {
        member: &'static str,
        #[source]
        error: RemoteError,
    },

    #[error("Remote member {member} returned {found}, expected {expected}")]
    UnexpectedValue {
        member: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VvError {
    /// Wrap a remote failure with the member that raised it.
    pub fn remote(member: &'static str, error: RemoteError) -> Self {
        VvError::Remote { member, error }
    }
}

/// Normalized description of a failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Description of the failure
    pub message: String,
    /// Numeric status code, 0 when unavailable
    pub code: i32,
    /// Component that raised the failure
    pub source: String,
}

impl ErrorInfo {
    /// Extract a best-effort record from any error.
    ///
    /// Walks the `source()` chain looking for a [`RemoteError`]; the first one found
    /// supplies code and source. Otherwise the display text of `err` is used with
    /// code 0 and source [`UNKNOWN_SOURCE`].
    pub fn extract(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
        while let Some(e) = current {
            if let Some(remote) = e.downcast_ref::<RemoteError>() {
                return Self::from(remote);
            }
            current = e.source();
        }
        Self {
            message: err.to_string(),
            code: 0,
            source: UNKNOWN_SOURCE.to_string(),
        }
    }
}

impl From<&RemoteError> for ErrorInfo {
    fn from(value: &RemoteError) -> Self {
        Self {
            message: value.description.clone(),
            code: value.code,
            source: value.source_component.clone(),
        }
    }
}

impl From<&VvError> for ErrorInfo {
    fn from(value: &VvError) -> Self {
        Self::extract(value)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {}, source {})", self.message, self.code, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_remote_error_through_wrapper() {
        let err = VvError::remote(
            "Teds",
            RemoteError::new(-2147352567, "VibrationVIEW", "Channel out of range"),
        );
        let info = ErrorInfo::from(&err);
        assert_eq!(info.message, "Channel out of range");
        assert_eq!(info.code, -2147352567);
        assert_eq!(info.source, "VibrationVIEW");
    }

    #[test]
    fn falls_back_to_display_text() {
        let info = ErrorInfo::from(&VvError::NotConnected);
        assert_eq!(info.message, "VibrationVIEW session is not connected");
        assert_eq!(info.code, 0);
        assert_eq!(info.source, UNKNOWN_SOURCE);
    }

    #[test]
    fn extracts_from_foreign_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such profile");
        let info = ErrorInfo::extract(&io);
        assert_eq!(info.message, "no such profile");
        assert_eq!(info.code, 0);
    }

    #[test]
    fn serializes_as_flat_record() {
        let info = ErrorInfo {
            message: "boom".into(),
            code: 7,
            source: "host".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["message"], "boom");
        assert_eq!(json["code"], 7);
        assert_eq!(json["source"], "host");
    }
}
