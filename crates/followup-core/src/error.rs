use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for followup.
#[derive(Debug, Error)]
pub enum FollowupError {
    /// The record store could not be reached or rejected a query.
    ///
    /// Raised by a sweep only when the store itself is unavailable; individual
    /// item failures never surface here.
    #[error("store unavailable: {0}")]
    Store(String),

    /// Error from the local notification host.
    #[error("notification error: {0}")]
    Notification(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a single reminder could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The owner has no email on file. Stays due until the owner adds one.
    MissingRecipient,
    /// The provider or network rejected the message. Retried next sweep.
    DeliveryFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRecipient => "missing_recipient",
            Self::DeliveryFailed => "delivery_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
