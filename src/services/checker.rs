// src/services/checker.rs

//! Change detection service.
//!
//! Fetches a resource and compares the md5 of its body with the stored hash.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ChangeVerdict, CheckerConfig, ResourceState, TrackedResource};
use crate::utils::{content_hash, http};

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Source of resource bodies.
///
/// An `Err` means no response was received at all.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse>;
}

/// Fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a fetcher with a client configured from settings.
    pub fn from_config(config: &CheckerConfig) -> Result<Self> {
        Ok(Self::new(http::create_async_client(config)?))
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(AppError::transport)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(AppError::transport)?
            .to_vec();
        Ok(FetchResponse { status, body })
    }
}

/// Service deciding whether a resource changed since its last check.
#[derive(Clone)]
pub struct ChangeDetector {
    fetcher: Arc<dyn Fetcher>,
}

impl ChangeDetector {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch the resource and compare it with its prior state.
    pub async fn check(&self, resource: &TrackedResource, prior: &ResourceState) -> ChangeVerdict {
        log::info!("Requesting '{}'", resource.url);

        let response = match self.fetcher.fetch(&resource.url).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Cannot connect to '{}': {}", resource.url, e);
                return ChangeVerdict::Unreachable(e.to_string());
            }
        };

        if response.status != StatusCode::OK.as_u16() {
            log::warn!(
                "Site {} returned {} code. Ignore.",
                resource.url,
                response.status
            );
            return ChangeVerdict::NonSuccess(response.status);
        }
        log::info!("{} response received", response.status);

        let hash = content_hash(&response.body);
        log::debug!(
            "Compare hashes...\n  {}\n  {}",
            hash,
            prior.hash.as_deref().unwrap_or_default()
        );

        if prior.matches(&hash) {
            return ChangeVerdict::Unchanged;
        }

        ChangeVerdict::Changed {
            previous: prior.snapshot().to_vec(),
            current: response.body,
            hash,
        }
    }
}
