//! # followup-store
//!
//! SQLite-backed record store, identity lookup, and delivery journal.

pub mod journal;
pub mod store;

pub use journal::{DeliveryJournal, JournalEntry, JournalStatus};
pub use store::Store;
