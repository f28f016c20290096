// src/models/mod.rs

//! Domain models for the change checker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod address;
mod config;
mod resource;
mod state;
mod verdict;

// Re-export all public types
pub use address::MailAddress;
pub use config::{CheckerConfig, Config, MailConfig, Options};
pub use resource::{ResourceId, TrackedResource, load_resources, parse_resources};
pub use state::ResourceState;
pub use verdict::ChangeVerdict;
