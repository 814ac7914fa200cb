//! Streaming HTTP source backed by `reqwest`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{DownloadStream, HttpClient},
};
use futures_util::TryStreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

/// Desktop [`HttpClient`].
///
/// Only the connect phase is bounded by a timeout. Once the body is flowing a
/// slow server stalls the download until the caller cancels it.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(4)
            .user_agent(concat!("coursevault-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn classify(url: &str, error: reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Network(format!("timed out connecting to {}", url))
        } else if error.is_connect() {
            BridgeError::Network(format!("connection to {} failed: {}", url, error))
        } else {
            BridgeError::OperationFailed(error.to_string())
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn download_stream(&self, url: String) -> Result<DownloadStream> {
        debug!(url = %url, "Opening download stream");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::classify(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Download request rejected");
            return Err(BridgeError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let content_length = response.content_length();
        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = StreamReader::new(stream);

        Ok(DownloadStream::new(Box::new(reader), content_length))
    }
}
