//! HTTP transport used to reach the Misskey API.

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use tracing::trace;

use crate::error::{BoxError, Result};

/// Sends a fully built request and reports the response status.
///
/// Implementations must release the response (body and connection) before
/// returning, whatever the status.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response status.
    async fn send(&self, request: http::Request<Vec<u8>>) -> std::result::Result<StatusCode, BoxError>;
}

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: http::Request<Vec<u8>>) -> std::result::Result<StatusCode, BoxError> {
        let request = reqwest::Request::try_from(request)?;
        trace!(url = %request.url(), "Sending request");

        let response = self.client.execute(request).await?;
        let status = response.status();
        // Dropping the response here returns the connection to the pool.
        drop(response);

        Ok(status)
    }
}
