//! A simplified S3 data source that supports downloading chunk objects.
//! It attempts to hide the complexities of working with the AWS SDK for S3.

use crate::error::FetchBenchError;
use crate::source::DataSource;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use bytes::Bytes;
use tracing::Instrument;
use url::Url;

/// Object storage account credentials.
#[derive(Clone, Eq, Hash, PartialEq)]
pub enum S3Credentials {
    AccessKey {
        access_key: String,
        secret_key: String,
    },
    None,
}

impl S3Credentials {
    /// Create an access key credential.
    pub fn access_key(access_key: &str, secret_key: &str) -> Self {
        S3Credentials::AccessKey {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

/// S3 data source.
///
/// Implements [DataSource] for S3-compatible object stores, with one object
/// per chunk.
#[derive(Clone)]
pub struct S3DataSource {
    /// Underlying AWS SDK S3 client object.
    client: Client,
    /// Bucket containing the chunk objects.
    bucket: String,
}

impl S3DataSource {
    /// Creates an S3DataSource object
    ///
    /// # Arguments
    ///
    /// * `url`: Object storage API URL
    /// * `bucket`: Bucket containing the chunk objects
    /// * `credentials`: Object storage account credentials
    pub async fn new(url: &Url, bucket: &str, credentials: S3Credentials) -> Self {
        let region = Region::new("us-east-1");
        let builder = aws_sdk_s3::Config::builder().behavior_version(BehaviorVersion::latest());
        let builder = match credentials {
            S3Credentials::AccessKey {
                access_key,
                secret_key,
            } => {
                let credentials = Credentials::from_keys(access_key, secret_key, None);
                builder.credentials_provider(credentials)
            }
            S3Credentials::None => builder,
        };
        let s3_config = builder
            .region(Some(region))
            .endpoint_url(url.to_string())
            .force_path_style(true)
            .build();
        let client = Client::from_conf(s3_config);
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl DataSource for S3DataSource {
    /// Downloads a chunk object from object storage and returns the data as
    /// Bytes.
    ///
    /// # Arguments
    ///
    /// * `key`: Name of the object in the bucket
    async fn fetch_chunk(&self, key: &str) -> Result<Bytes, FetchBenchError> {
        let mut response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .instrument(tracing::Span::current())
            .await?;
        // Fail if the content length header is missing.
        let content_length: usize = response
            .content_length()
            .ok_or(FetchBenchError::S3ContentLengthMissing)?
            .try_into()?;
        let mut buf = Vec::with_capacity(content_length);
        // Iterate over the streaming response, copying data into the buffer.
        while let Some(bytes) = response
            .body
            .try_next()
            .instrument(tracing::Span::current())
            .await?
        {
            buf.extend_from_slice(&bytes)
        }
        // Return as Bytes.
        Ok(buf.into())
    }
}
