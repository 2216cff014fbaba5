//! # HTTP transport to an external trace processor.
//!
//! Each request is `POST {base}/{method}` with the raw bytes as body; the
//! response body is the result. Ordering comes from the queue, which never
//! issues a call before the previous one returned.

use std::time::Duration;

use async_trait::async_trait;

use super::method::{EngineMode, EngineRequest};
use super::transport::Transport;
use crate::error::EngineError;

/// Transport speaking to `{base}/parse`, `{base}/raw_query`, ...
pub struct HttpTransport {
    client: reqwest::Client,
    base: String,
}

impl HttpTransport {
    pub fn new(base: &str) -> Result<Self, EngineError> {
        Ok(Self {
            client: client(None)?,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn mode(&self) -> EngineMode {
        EngineMode::HttpRpc
    }

    async fn round_trip(&mut self, request: EngineRequest) -> Result<Vec<u8>, EngineError> {
        let url = format!("{}/{}", self.base, request.method.as_str());
        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(request.data)
            .send()
            .await
            .map_err(|e| EngineError::failed(format!("POST {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::failed(format!("HTTP {} from {url}: {body}", status.as_u16())));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| EngineError::failed(format!("reading {url}: {e}")))?;
        Ok(body.to_vec())
    }
}

/// Probes `{base}/status`, giving up after `timeout`.
///
/// Used only to discover whether the accelerator is running.
pub async fn check_connection(base: &str, timeout: Duration) -> Result<(), EngineError> {
    let url = format!("{}/status", base.trim_end_matches('/'));
    let client = client(Some(timeout))?;
    let resp = tokio::time::timeout(timeout, client.post(&url).send())
        .await
        .map_err(|_| EngineError::failed(format!("{url} did not answer within {timeout:?}")))?
        .map_err(|e| EngineError::failed(format!("POST {url}: {e}")))?;

    if !resp.status().is_success() {
        return Err(EngineError::failed(format!(
            "HTTP {} from {url}",
            resp.status().as_u16()
        )));
    }
    Ok(())
}

fn client(connect_timeout: Option<Duration>) -> Result<reqwest::Client, EngineError> {
    let mut builder = reqwest::Client::builder().no_proxy();
    if let Some(t) = connect_timeout {
        builder = builder.connect_timeout(t);
    }
    builder
        .build()
        .map_err(|e| EngineError::failed(format!("building HTTP client: {e}")))
}
