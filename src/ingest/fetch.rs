// src/ingest/fetch.rs
//! Resilient HTTP GET shared by every adapter.
//!
//! One attempt covers send, status check and body read/parse, and is bounded
//! by the per-attempt timeout. Network errors, timeouts, non-2xx statuses and
//! malformed JSON are all retried after a fixed pause until the retry budget
//! is spent; then the last error is returned.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "PackersPulse/1.0";

#[derive(Clone, Debug)]
pub struct FetchClient {
    client: Client,
    timeout: Duration,
    max_retries: u8,
    pause: Duration,
}

impl FetchClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(15),
            max_retries: 2,
            pause: Duration::from_secs(1),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T> {
        self.get_with(url, headers, |body| {
            serde_json::from_str(body).context("decoding JSON body")
        })
        .await
    }

    pub async fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        self.get_with(url, headers, |body| Ok(body.to_string()))
            .await
    }

    async fn get_with<T, F>(&self, url: &str, headers: &[(&str, &str)], parse: F) -> Result<T>
    where
        F: Fn(&str) -> Result<T>,
    {
        let mut attempt: u8 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let res = match tokio::time::timeout(self.timeout, self.attempt(url, headers)).await {
                Ok(Ok(body)) => parse(&body),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(anyhow!("timed out after {:?}", self.timeout)),
            };

            match res {
                Ok(v) => return Ok(v),
                Err(e) if attempt <= self.max_retries => {
                    tracing::warn!(
                        target: "ingest",
                        url,
                        attempt,
                        error = %format!("{e:#}"),
                        "fetch attempt failed, retrying"
                    );
                    counter!("fetch_retries_total").increment(1);
                    tokio::time::sleep(self.pause).await;
                }
                Err(e) => {
                    counter!("fetch_failures_total").increment(1);
                    return Err(e.context(format!("GET {url} failed after {attempt} attempt(s)")));
                }
            }
        }
    }

    async fn attempt(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let resp = req.send().await.context("http get")?;
        let resp = resp.error_for_status().context("non-2xx status")?;
        resp.text().await.context("reading body")
    }
}
