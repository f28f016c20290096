// src/models/resource.rs

//! Tracked resources and the resource list format.
//!
//! Each qualifying line of the list reads `url;striphtml;email[;email...]`.
//! Everything else (comments, blank lines, malformed lines) is ignored.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::MailAddress;
use crate::utils::content_hash;

/// Lines with at least two `;` and no leading comment.
static RESOURCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^#]*?;.*?[;.*?]+;?").expect("valid resource line pattern"));

/// Length of the hex prefix used as a resource id.
const ID_LEN: usize = 8;

/// Stable identifier of a resource, derived from its URL string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    /// Derive the id from the URL exactly as written.
    pub fn from_url(url: &str) -> Self {
        let mut digest = content_hash(url.as_bytes());
        digest.truncate(ID_LEN);
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One watched URL with its recipients.
#[derive(Debug, Clone)]
pub struct TrackedResource {
    id: ResourceId,
    pub url: Url,
    /// Strip markup from the diff before mailing it
    pub strip_html: bool,
    pub recipients: Vec<MailAddress>,
}

impl TrackedResource {
    pub fn new(url: &str, strip_html: bool, recipients: Vec<MailAddress>) -> Result<Self> {
        let parsed = Url::parse(url)?;
        Ok(Self {
            id: ResourceId::from_url(url),
            url: parsed,
            strip_html,
            recipients,
        })
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Host name used in subjects and log lines.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_else(|| self.url.as_str())
    }

    /// Parse one line of the resource list.
    ///
    /// Returns `None` for lines that are not resource definitions.
    pub fn parse_line(line: &str) -> Option<Result<Self>> {
        if !RESOURCE_LINE.is_match(line) {
            return None;
        }

        let fields: Vec<&str> = line.trim().split(';').collect();
        let recipients: Vec<MailAddress> = fields
            .get(2..)
            .unwrap_or_default()
            .iter()
            .filter(|field| !field.trim().is_empty())
            .map(|field| MailAddress::parse(field))
            .collect();

        let url = fields[0].trim();
        if url.is_empty() || recipients.is_empty() {
            return None;
        }

        Some(Self::new(url, is_truthy(fields[1]), recipients))
    }
}

impl fmt::Display for TrackedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let recipients: Vec<&str> = self.recipients.iter().map(|r| r.as_str()).collect();
        write!(
            f,
            "{};{};{}",
            self.url,
            if self.strip_html { "yes" } else { "no" },
            recipients.join(";")
        )
    }
}

fn is_truthy(token: &str) -> bool {
    matches!(
        token.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "1" | "on"
    )
}

/// Parse resource definitions from the list contents.
///
/// Lines whose URL cannot be parsed are skipped with a warning.
pub fn parse_resources(content: &str) -> Vec<TrackedResource> {
    let mut resources = Vec::new();

    for (number, line) in content.lines().enumerate() {
        match TrackedResource::parse_line(line) {
            Some(Ok(resource)) => resources.push(resource),
            Some(Err(e)) => {
                log::warn!("Skipping line {}: {}", number + 1, e);
            }
            None => {}
        }
    }

    resources
}

/// Load the resource list from a file.
pub fn load_resources(path: impl AsRef<Path>) -> Result<Vec<TrackedResource>> {
    let path = path.as_ref();
    log::debug!("Load sites from '{}'", path.display());

    let content = fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("Config file '{}' is not readable: {}", path.display(), e))
    })?;
    let resources = parse_resources(&content);

    log::debug!(
        "{} {} loaded",
        resources.len(),
        if resources.len() == 1 { "site" } else { "sites" }
    );
    for resource in &resources {
        log::debug!(
            "  {}\n    url: {}\n    id: {}",
            resource.host(),
            resource.url,
            resource.id()
        );
    }

    Ok(resources)
}
