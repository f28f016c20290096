// src/models/verdict.rs

//! Outcome of checking one resource.

use std::fmt;

/// Result of fetching a resource and comparing it with its stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeVerdict {
    /// The request failed before a response arrived
    Unreachable(String),

    /// A response arrived with a status other than 200
    NonSuccess(u16),

    /// The body hashes to the stored hash
    Unchanged,

    /// The body differs from the stored snapshot
    Changed {
        previous: Vec<u8>,
        current: Vec<u8>,
        hash: String,
    },
}

impl fmt::Display for ChangeVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable(reason) => write!(f, "unreachable ({reason})"),
            Self::NonSuccess(status) => write!(f, "returned {status}"),
            Self::Unchanged => f.write_str("unchanged"),
            Self::Changed { hash, .. } => write!(f, "changed ({hash})"),
        }
    }
}
