use crate::errors::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Raw upstream response: status code and the full body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used by providers to reach their upstream API.
///
/// Providers take this as a constructor argument so tests can swap in a fake.
#[async_trait]
pub trait HttpGet: Send + Sync {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, ProviderError>;
}

/// Decodes an upstream payload into a provider-specific DTO.
pub type Decoder<T> = fn(&[u8]) -> Result<T, serde_json::Error>;

pub fn json_decoder<T: DeserializeOwned>() -> Decoder<T> {
    |bytes| serde_json::from_slice(bytes)
}

/// Upstream request timeout used by [`HttpClient::default`].
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(2);

/// reqwest-backed [`HttpGet`] with a per-request timeout. No retries.
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, timeout })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        // Building a client only fails if the TLS backend cannot initialise.
        Self::new(DEFAULT_HTTP_TIMEOUT).expect("Failed to create HTTP client")
    }
}

#[async_trait]
impl HttpGet for HttpClient {
    // Query strings carry credentials, so only the bare URL is recorded.
    #[instrument(skip(self, query), fields(url = %url))]
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, ProviderError> {
        let response = tokio::time::timeout(self.timeout, self.client.get(url).query(query).send())
            .await
            .map_err(|_| ProviderError::timeout(format!("Request to {} timed out", url)))?
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::timeout(format!("Request to {} timed out", url))
                } else {
                    ProviderError::Transport(e)
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Body(e.to_string()))?;

        debug!(status, bytes = body.len(), "Upstream responded");

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
