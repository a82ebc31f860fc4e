//! Application records and the people who own them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where an application currently stands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Wishlist,
    Applied,
    Interview,
    Offer,
    Rejected,
    Accepted,
}

impl ApplicationStatus {
    /// Return all status variants in pipeline order.
    pub fn all() -> &'static [ApplicationStatus] {
        &[
            ApplicationStatus::Wishlist,
            ApplicationStatus::Applied,
            ApplicationStatus::Interview,
            ApplicationStatus::Offer,
            ApplicationStatus::Rejected,
            ApplicationStatus::Accepted,
        ]
    }

    /// Stable lowercase identifier, as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wishlist => "wishlist",
            Self::Applied => "applied",
            Self::Interview => "interview",
            Self::Offer => "offer",
            Self::Rejected => "rejected",
            Self::Accepted => "accepted",
        }
    }

    /// Capitalized label for messages shown to people.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Wishlist => "Wishlist",
            Self::Applied => "Applied",
            Self::Interview => "Interview",
            Self::Offer => "Offer",
            Self::Rejected => "Rejected",
            Self::Accepted => "Accepted",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known [`ApplicationStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application status: {0}")]
pub struct StatusParseError(pub String);

impl FromStr for ApplicationStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wishlist" => Ok(Self::Wishlist),
            "applied" => Ok(Self::Applied),
            "interview" => Ok(Self::Interview),
            "offer" => Ok(Self::Offer),
            "rejected" => Ok(Self::Rejected),
            "accepted" => Ok(Self::Accepted),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

/// A tracked job application, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: String,
    pub owner_id: String,
    pub company: String,
    pub position: String,
    #[serde(default)]
    pub location: Option<String>,
    pub status: ApplicationStatus,
    pub applied_date: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    /// Follow-up instant. `None` means no reminder is armed.
    #[serde(default)]
    pub reminder: Option<DateTime<Utc>>,
    /// True only once a notification for the current `reminder` was delivered.
    #[serde(default)]
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    /// Optional fields with blank text are treated as absent.
    pub fn location(&self) -> Option<&str> {
        present(&self.location)
    }

    pub fn notes(&self) -> Option<&str> {
        present(&self.notes)
    }

    pub fn url(&self) -> Option<&str> {
        present(&self.url)
    }

    pub fn contact_name(&self) -> Option<&str> {
        present(&self.contact_name)
    }

    pub fn contact_email(&self) -> Option<&str> {
        present(&self.contact_email)
    }
}

/// Creation payload for an application. The owner comes from the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub company: String,
    pub position: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: ApplicationStatus,
    pub applied_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub reminder: Option<DateTime<Utc>>,
}

/// Where a reminder email goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
}

impl Recipient {
    /// Name used in greetings, "there" when the user never set one.
    pub fn greeting_name(&self) -> &str {
        present(&self.name).unwrap_or("there")
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
