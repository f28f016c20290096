//! Storage abstractions for per-resource state.
//!
//! Each resource owns two artifacts in one directory:
//!
//! ```text
//! {dir}/
//! ├── 1a2b3c4d.md5          # hex hash of the last seen body
//! └── 1a2b3c4d.site         # raw bytes of the last seen body
//! ```
//!
//! A commit writes the `.site` artifact before the `.md5` artifact, each
//! through a temporary file and a rename. A crash between the two leaves an
//! old hash next to new content, which the next pass reports as a change
//! again; it never leaves a hash describing content that was not written.

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::error::Result;
use crate::models::{ResourceId, ResourceState};

// Re-export for convenience
pub use local::LocalStateStore;

/// Extension of the hash artifact.
pub const HASH_EXT: &str = "md5";

/// Extension of the content artifact.
pub const CONTENT_EXT: &str = "site";

/// Trait for resource state backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load hash and content independently; missing artifacts are `None`.
    async fn load(&self, id: &ResourceId) -> Result<ResourceState>;

    /// Overwrite both artifacts, content first.
    async fn commit(&self, id: &ResourceId, hash: &str, content: &[u8]) -> Result<()>;

    /// Remove both artifacts. Succeeds if they are already gone.
    async fn clear(&self, id: &ResourceId) -> Result<()>;

    /// Remove every artifact in the store, returning how many were removed.
    async fn clear_all(&self) -> Result<usize>;

    /// When the hash artifact was last written, if it exists.
    async fn last_modified(&self, id: &ResourceId) -> Option<DateTime<Local>>;
}
