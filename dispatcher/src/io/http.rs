//! Blocking HTTP access for upstream version lookups and source downloads.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use tracing::{debug, instrument};

const USER_AGENT: &str = concat!("feedstock-dispatcher/", env!("CARGO_PKG_VERSION"));

/// Read-only HTTP access. A 404 is an answer, not an error.
pub trait Fetch {
    /// Body as text, or `None` when the resource does not exist.
    fn get_text(&self, url: &str) -> Result<Option<String>>;

    /// Body as bytes, or `None` when the resource does not exist.
    fn get_bytes(&self, url: &str) -> Result<Option<Vec<u8>>>;

    /// True if the URL answers with a success status.
    fn exists(&self, url: &str) -> Result<bool>;
}

/// `Fetch` implementation backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<Option<Response>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = response.status();
        debug!(%status, "response");
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!("GET {url} returned {status}"));
        }
        Ok(Some(response))
    }
}

impl Fetch for HttpFetcher {
    #[instrument(skip(self))]
    fn get_text(&self, url: &str) -> Result<Option<String>> {
        match self.get(url)? {
            Some(response) => Ok(Some(
                response.text().with_context(|| format!("read body of {url}"))?,
            )),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    fn get_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        match self.get(url)? {
            Some(response) => Ok(Some(
                response
                    .bytes()
                    .with_context(|| format!("read body of {url}"))?
                    .to_vec(),
            )),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    fn exists(&self, url: &str) -> Result<bool> {
        let response = self
            .client
            .head(url)
            .send()
            .with_context(|| format!("HEAD {url}"))?;
        debug!(status = %response.status(), "response");
        Ok(response.status().is_success())
    }
}
