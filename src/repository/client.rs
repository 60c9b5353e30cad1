// src/repository/client.rs

//! HTTP client for remote repositories
//!
//! Wraps a blocking reqwest client with retry support for fetching repository
//! indexes and artifact payloads.

use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Maximum attempts for a failed request
const MAX_RETRIES: u32 = 3;

/// Base retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// HTTP client wrapper with retry support
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("tpexport/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Setup(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Fetch a URL into memory
    ///
    /// Connection failures and server errors are retried; a 404 fails immediately
    /// with [`Error::RepositoryNotFound`] so callers can fall back to other files.
    pub fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!("GET {} (attempt {})", url, attempt);

            let failure = match self.client.get(url.clone()).send() {
                Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                    return Err(Error::RepositoryNotFound(url.to_string()));
                }
                Ok(response) if response.status().is_success() => {
                    let bytes = response
                        .bytes()
                        .map_err(|e| Error::Download(format!("Failed to read {url}: {e}")))?;
                    return Ok(bytes.to_vec());
                }
                Ok(response) if response.status().is_client_error() => {
                    return Err(Error::Download(format!("HTTP {} from {}", response.status(), url)));
                }
                Ok(response) => format!("HTTP {}", response.status()),
                Err(e) => e.to_string(),
            };

            if attempt >= self.max_retries {
                return Err(Error::Download(format!(
                    "Failed to fetch {url} after {attempt} attempts: {failure}"
                )));
            }
            warn!("Fetch attempt {} for {} failed: {}, retrying...", attempt, url, failure);
            std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
        }
    }
}
