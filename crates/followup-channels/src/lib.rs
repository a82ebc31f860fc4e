//! # followup-channels
//!
//! Reminder delivery channels. Email is the authoritative channel whose
//! success acknowledges a reminder; desktop notifications are a best-effort
//! courtesy signal for the local user.

pub mod desktop;
pub mod email;

pub use desktop::{CommandHost, DesktopNotifier, Notification, NotificationHost};
pub use email::EmailChannel;
