//! Error classification shared by every module.
//!
//! Each module defines its own `thiserror` enum. They all report an
//! [`ErrorKind`] so callers can pick a response status without matching
//! on message text.

use std::fmt;

/// Coarse error category used to map failures onto response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input, missing SEC detail, unsupported SEC code. Never retried.
    Validation,
    /// Already initiated, quota exhausted, already claimed.
    Conflict,
    /// Verification failures. Messages are intentionally low-information.
    Compliance,
    /// Failure talking to the ACH service or another remote collaborator.
    External,
    /// Referenced record does not exist (or is tombstoned).
    NotFound,
    /// Storage or invariant failure inside the pipeline.
    Internal,
}

impl ErrorKind {
    /// Suggested HTTP status code
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::Compliance => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::External => 502,
            ErrorKind::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Compliance => "COMPLIANCE",
            ErrorKind::External => "EXTERNAL",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// Whether the surrounding workflow may be retried as a whole.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Conflict | ErrorKind::External)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
