//! Completion statuses and message severities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatusType {
    /// Success
    Ok,
    /// Success with a warning
    Warning,
    /// Failure
    Error,
    /// Unrecoverable failure
    Fatal,
}

/// Protocol-level status passed to requesters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    kind: StatusType,
    message: String,
}

impl Status {
    /// Plain success.
    pub fn ok() -> Self {
        Self {
            kind: StatusType::Ok,
            message: String::new(),
        }
    }

    /// Success with a warning.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: StatusType::Warning,
            message: message.into(),
        }
    }

    /// Failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusType::Error,
            message: message.into(),
        }
    }

    /// Unrecoverable failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: StatusType::Fatal,
            message: message.into(),
        }
    }

    /// Severity.
    pub fn kind(&self) -> StatusType {
        self.kind
    }

    /// Message text, empty for plain success.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Plain success.
    pub fn is_ok(&self) -> bool {
        self.kind == StatusType::Ok
    }

    /// Success, with or without a warning.
    pub fn is_success(&self) -> bool {
        matches!(self.kind, StatusType::Ok | StatusType::Warning)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            write!(f, "{:?}: {}", self.kind, self.message)
        }
    }
}

/// Severity of a message sent to a requester's message sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Fatal error
    Fatal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_predicates() {
        assert!(Status::ok().is_ok());
        assert!(Status::warning("w").is_success());
        assert!(!Status::warning("w").is_ok());
        assert!(!Status::error("e").is_success());
        assert_eq!(Status::default(), Status::ok());
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::ok().to_string(), "Ok");
        assert_eq!(Status::error("boom").to_string(), "Error: boom");
    }
}
