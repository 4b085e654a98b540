// src/utils/http.rs

//! HTTP client utilities.
//!
//! The pipeline runs one request at a time, so everything here uses the
//! blocking client.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create a configured blocking HTTP client.
pub fn create_client(config: &HttpConfig) -> Result<Client> {
    create_client_with_timeout(&config.user_agent, config.timeout_secs)
}

/// Create a blocking HTTP client with an explicit timeout.
pub fn create_client_with_timeout(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// Plain GET access to third-party resources (pages, oEmbed, images).
///
/// Any non-success status is reported as [`AppError::Status`].
pub trait Fetch {
    /// Fetch a URL as text.
    fn get_text(&self, url: &str) -> Result<String>;

    /// Fetch a URL as raw bytes.
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Fetch a URL and parse the body as JSON.
    fn get_json(&self, url: &str) -> Result<Value> {
        let text = self.get_text(url)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// [`Fetch`] backed by a reqwest blocking client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(create_client(config)?))
    }

    fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Fetch for HttpFetcher {
    fn get_text(&self, url: &str) -> Result<String> {
        Ok(self.get(url)?.text()?)
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.get(url)?.bytes()?.to_vec())
    }
}
