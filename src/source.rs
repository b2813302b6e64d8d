//! Remote data sources.
//!
//! A [DataSource] supplies chunk bytes by object key. Implementations exist
//! for S3-compatible object stores and plain HTTP(S) servers; the benchmark
//! runner only sees the trait.

use crate::error::FetchBenchError;
use crate::http_source::HttpDataSource;
use crate::s3_source::{S3Credentials, S3DataSource};

use async_trait::async_trait;
use bytes::Bytes;
use clap::ValueEnum;
use serde::Deserialize;
use strum_macros::Display;
use url::Url;

/// Data source trait.
///
/// Defines the interface for fetching one chunk of data from a remote source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the data for one chunk.
    ///
    /// Returns bytes.
    ///
    /// # Arguments
    ///
    /// * `key`: Object key of the chunk within the source
    async fn fetch_chunk(&self, key: &str) -> Result<Bytes, FetchBenchError>;
}

/// Supported data source interfaces.
#[derive(Clone, Copy, Debug, Deserialize, Display, PartialEq, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    /// S3-compatible object store
    S3,
    /// Plain HTTP(S) server
    Http,
}

/// Create a [DataSource] for the given interface.
///
/// # Arguments
///
/// * `kind`: Data source interface
/// * `url`: Source URL: the store endpoint for S3, the base URL for HTTP
/// * `bucket`: Bucket containing the chunk objects (S3 only)
/// * `credentials`: Object storage account credentials (S3 only)
pub async fn create(
    kind: SourceKind,
    url: &Url,
    bucket: &str,
    credentials: S3Credentials,
) -> Result<Box<dyn DataSource>, FetchBenchError> {
    // Both interfaces are reached over HTTP(S).
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchBenchError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
        });
    }
    match kind {
        SourceKind::S3 => Ok(Box::new(S3DataSource::new(url, bucket, credentials).await)),
        SourceKind::Http => Ok(Box::new(HttpDataSource::new(url.clone()))),
    }
}
