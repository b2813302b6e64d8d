//! Error handling.

use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_smithy_types::byte_stream::error::Error as ByteStreamError;
use thiserror::Error;
use tokio::sync::AcquireError;

/// fetchbench error type
///
/// This type encapsulates the various errors that may occur while running a
/// benchmark. Any of them aborts the enclosing run.
#[derive(Debug, Error)]
pub enum FetchBenchError {
    /// Mismatch between a dataset shape and its chunk shape
    #[error("chunk shape {chunk_shape:?} is not valid for dataset shape {shape:?}")]
    ChunkShapeMismatch {
        shape: Vec<usize>,
        chunk_shape: Vec<usize>,
    },

    /// HTTP request failure
    #[error("HTTP request failed: {error}")]
    HttpRequest { error: String },

    /// Missing Content-Length header in an HTTP response.
    #[error("HTTP response missing Content-Length header")]
    HttpContentLengthMissing,

    /// Error from the HTTP client
    #[error("error fetching object over HTTP")]
    HttpClient(#[from] reqwest::Error),

    /// Chunk too large for the configured memory limit
    #[error("insufficient memory to fetch chunk ({requested} > {total})")]
    InsufficientMemory { requested: usize, total: usize },

    /// Invalid memory limit argument
    #[error("invalid memory limit: {error}")]
    InvalidMemoryLimit { error: String },

    /// Error reading or writing a local file (plan or report)
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Error deserialising a benchmark plan
    #[error("benchmark plan is not valid JSON")]
    PlanJson(#[from] serde_json::Error),

    /// Error validating a benchmark plan (single error)
    #[error("benchmark plan is not valid")]
    PlanValidationSingle(#[from] validator::ValidationError),

    /// Error validating a benchmark plan (multiple errors)
    #[error("benchmark plan is not valid")]
    PlanValidation(#[from] validator::ValidationErrors),

    /// Error formatting the report timestamp
    #[error("failed to format report timestamp: {error}")]
    ReportFormat { error: String },

    /// Error receiving object data from S3
    #[error("error receiving object from S3 storage")]
    S3ByteStream(#[from] ByteStreamError),

    /// Missing Content-Length header in an S3 response.
    #[error("S3 response missing Content-Length header")]
    S3ContentLengthMissing,

    /// Error while retrieving an object from S3
    #[error("error retrieving object from S3 storage")]
    S3GetObject(#[from] Box<SdkError<GetObjectError>>),

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquireError(#[from] AcquireError),

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// Error resolving a chunk URL against the source base URL
    #[error("failed to resolve chunk URL")]
    UrlParse(#[from] url::ParseError),

    /// Unsupported URL scheme for a data source
    #[error("unsupported data source scheme {scheme}")]
    UnsupportedScheme { scheme: String },

    /// Timed out waiting for the worker pool to reach the requested size
    #[error("timed out waiting for {expected} workers ({actual} registered)")]
    WorkerWaitTimeout { expected: usize, actual: usize },

    /// A benchmark task panicked or was cancelled
    #[error("benchmark task failed: {error}")]
    TaskFailed { error: String },
}

// The AWS SDK error type is large, so box it rather than inflating the enum.
impl From<SdkError<GetObjectError>> for FetchBenchError {
    fn from(error: SdkError<GetObjectError>) -> Self {
        FetchBenchError::S3GetObject(Box::new(error))
    }
}
