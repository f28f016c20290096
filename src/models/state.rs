// src/models/state.rs

//! Persisted per-resource state.

use crate::utils::content_hash;

/// Last known hash and snapshot of a resource.
///
/// Both fields are `None` for a resource that was never checked. They are
/// loaded independently, so one may be present without the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceState {
    pub hash: Option<String>,
    pub content: Option<Vec<u8>>,
}

impl ResourceState {
    /// State of a resource seen for the first time.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether no hash was ever stored.
    pub fn is_new(&self) -> bool {
        self.hash.as_deref().is_none_or(str::is_empty)
    }

    /// Whether `hash` equals the stored hash. An absent hash matches nothing.
    pub fn matches(&self, hash: &str) -> bool {
        !self.is_new() && self.hash.as_deref() == Some(hash)
    }

    /// Previous snapshot, empty when none was stored.
    pub fn snapshot(&self) -> &[u8] {
        self.content.as_deref().unwrap_or_default()
    }

    /// Whether the stored hash agrees with the stored content.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        match (&self.hash, &self.content) {
            (Some(hash), Some(content)) => *hash == content_hash(content),
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state_never_matches() {
        let state = ResourceState::empty();
        assert!(state.is_new());
        assert!(!state.matches(""));
        assert!(!state.matches(&content_hash(b"")));
        assert!(state.snapshot().is_empty());
    }

    #[test]
    fn test_blank_hash_is_new() {
        let state = ResourceState {
            hash: Some(String::new()),
            content: None,
        };
        assert!(state.is_new());
        assert!(!state.matches(""));
    }

    #[test]
    fn test_matches_stored_hash() {
        let hash = content_hash(b"hello");
        let state = ResourceState {
            hash: Some(hash.clone()),
            content: Some(b"hello".to_vec()),
        };
        assert!(state.matches(&hash));
        assert!(!state.matches(&content_hash(b"world")));
        assert!(state.is_consistent());
        assert_eq!(state.snapshot(), b"hello");
    }

    #[test]
    fn test_inconsistent_state() {
        let state = ResourceState {
            hash: Some(content_hash(b"old")),
            content: Some(b"new".to_vec()),
        };
        assert!(!state.is_consistent());
    }
}
