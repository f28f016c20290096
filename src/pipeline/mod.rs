//! Pipeline entry points for checker operations.
//!
//! - `run_checker`: One pass over every configured resource
//! - `DiffEngine`: Unified diffs between stored and fetched snapshots

pub mod check;
pub mod diff;

pub use check::{Orchestrator, PassOutcome, PassSummary, ResourceReport, run_checker};
pub use diff::DiffEngine;
