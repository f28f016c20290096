//! Unified diff between two snapshots of a resource.
//!
//! The diff is what gets mailed, so it stays plain text: `---`/`+++`
//! headers carrying descriptive labels, then hunks with a small amount of
//! context.

use chrono::{DateTime, Local};
use similar::TextDiff;

use crate::utils::decode_page;

/// Timestamp format used in diff labels.
const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Calculator for unified diffs between snapshots.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    /// Lines of unchanged context around each hunk
    context: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DiffEngine {
    /// Create a diff engine with the given context radius.
    pub fn new(context: usize) -> Self {
        Self { context }
    }

    /// Unified diff from `old` to `new`. Empty when both are equal.
    ///
    /// Each side is decoded with its own declared charset.
    pub fn diff(&self, old: &[u8], new: &[u8], old_label: &str, new_label: &str) -> String {
        if old == new {
            return String::new();
        }

        let old = decode_page(old);
        let new = decode_page(new);
        let diff = TextDiff::from_lines(old.as_ref(), new.as_ref());

        diff.unified_diff()
            .context_radius(self.context)
            .header(old_label, new_label)
            .to_string()
    }
}

/// `OLD (<time>)`, or `OLD (never)` for a first sighting.
pub fn old_label(last_modified: Option<DateTime<Local>>) -> String {
    match last_modified {
        Some(time) => format!("OLD ({})", time.format(LABEL_FORMAT)),
        None => "OLD (never)".to_string(),
    }
}

/// `NEW (<time>)`
pub fn new_label(now: DateTime<Local>) -> String {
    format!("NEW ({})", now.format(LABEL_FORMAT))
}
