//! HTTP(S) data source.

use crate::error::FetchBenchError;
use crate::source::DataSource;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

/// HTTP data source.
///
/// Implements [DataSource] for plain HTTP(S) servers, with one resource per
/// chunk below a base URL.
#[derive(Debug)]
pub struct HttpDataSource {
    /// HTTP client, reused across chunk requests.
    reqwest_client: reqwest::Client,
    /// Base URL below which chunk objects are resolved.
    base: Url,
}

impl HttpDataSource {
    /// Create a new HTTP data source.
    ///
    /// # Arguments
    ///
    /// * `base`: Base URL below which chunk objects are resolved
    pub fn new(base: Url) -> Self {
        Self {
            reqwest_client: reqwest::Client::new(),
            base,
        }
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    /// Downloads one chunk resource.
    ///
    /// Returns bytes.
    ///
    /// # Arguments
    ///
    /// * `key`: Path of the chunk resource relative to the base URL
    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn fetch_chunk(&self, key: &str) -> Result<Bytes, FetchBenchError> {
        let url = self.base.join(key)?;
        let response = self.reqwest_client.get(url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(FetchBenchError::HttpRequest {
                error: format!("HTTP request failed with status: {}", response.status()),
            });
        }
        // Fail if the content length header is missing.
        response
            .content_length()
            .ok_or(FetchBenchError::HttpContentLengthMissing)?;
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_resolution() {
        let base = Url::parse("https://example.com/store/").unwrap();
        assert_eq!(
            "https://example.com/store/data/0.1",
            base.join("data/0.1").unwrap().as_str()
        );
    }
}
