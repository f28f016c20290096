// src/models/address.rs

//! Mail address parsing.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// `Display Name <user@host>`
static NAMED_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\s]+<.+@[^@]+>$").expect("valid named address pattern"));

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+@[^@>]+)>").expect("valid bracket pattern"));

/// A recipient or sender address with its display name.
///
/// Parsing never fails; input that is not in the `Name <user@host>` form is
/// taken verbatim as the address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAddress {
    raw: String,
    name: String,
    address: String,
    bracketed: bool,
}

impl MailAddress {
    /// Parse a free-form address string.
    ///
    /// - `"Me <me@example.org>"` → name `Me`, address `me@example.org`
    /// - `"me2@example.org"` → name `me2`, address `me2@example.org`
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_string();

        if NAMED_FORM.is_match(&raw) {
            if let Some(caps) = BRACKETED.captures(&raw) {
                let address = caps[1].to_string();
                let name = BRACKETED.replace_all(&raw, "").trim().to_string();
                return Self {
                    raw,
                    name,
                    address,
                    bracketed: true,
                };
            }
        }

        // Split on the final '@' only; the local part may contain more.
        let name = raw
            .rsplit_once('@')
            .map(|(local, _)| local.to_string())
            .unwrap_or_default();

        Self {
            address: raw.clone(),
            raw,
            name,
            bracketed: false,
        }
    }

    /// The display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bare `user@host` address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the input carried an explicit `<...>` address segment.
    pub fn has_display_name(&self) -> bool {
        self.bracketed
    }

    /// The trimmed input string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bracketed {
            write!(f, "{} <{}>", self.name, self.address)
        } else {
            f.write_str(&self.address)
        }
    }
}
