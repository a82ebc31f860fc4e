//! # followup-core
//!
//! Core types, collaborator traits, configuration, and the pure reminder
//! logic (due detection and reminder edits) shared by every followup crate.

pub mod config;
pub mod error;
pub mod record;
pub mod reminder;
pub mod traits;

pub use config::shellexpand;
