//! Benchmark plan and runner.
//!
//! A [BenchmarkPlan] describes one benchmark run: the dataset geometry, the
//! data source, the worker counts to sweep and the trial count per sweep
//! point. The [BenchmarkRunner] executes the plan, fetching every chunk of
//! the dataset into a [DevNullStore] under a [DiagnosticTimer] guard, and
//! returns the accumulated trial table.

use crate::array::{get_chunksize, ChunkSpec, ChunkedDataset};
use crate::cluster::{ClusterClient, WorkerSpec};
use crate::error::FetchBenchError;
use crate::s3_source::S3Credentials;
use crate::sink::{ChunkSink, DevNullStore};
use crate::source::{self, DataSource, SourceKind};
use crate::timer::{DiagnosticTimer, MValue, TrialTable};
use crate::types::DType;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;
use validator::{Validate, ValidationError};

/// Maximum time to wait for the worker pool to reach a sweep's size.
const WORKER_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Description of one benchmark run.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkPlan {
    /// URL of the data source: store endpoint for S3, base URL for HTTP
    pub source_url: Url,
    /// Data source interface
    #[serde(default = "default_interface")]
    pub interface: SourceKind,
    /// Bucket containing the chunk objects (S3 only)
    #[serde(default)]
    pub bucket: String,
    /// Object key prefix of the dataset within the source
    #[serde(default)]
    pub prefix: String,
    /// Element data type
    pub dtype: DType,
    /// Shape of the dataset
    #[validate(
        length(min = 1, message = "shape length must be greater than 0"),
        custom = "validate_shape"
    )]
    pub shape: Vec<usize>,
    /// Shape of one chunk
    #[validate(
        length(min = 1, message = "chunk shape length must be greater than 0"),
        custom = "validate_shape"
    )]
    pub chunk_shape: Vec<usize>,
    /// Worker counts to sweep over
    #[validate(
        length(min = 1, message = "at least one worker count is required"),
        custom = "validate_worker_counts"
    )]
    pub worker_counts: Vec<usize>,
    /// Number of trials per worker count
    #[validate(range(min = 1, message = "trials must be greater than 0"))]
    pub trials: u32,
    /// Number of times to retry a failed chunk fetch
    #[serde(default)]
    pub retries: u32,
    /// CPU cores per worker
    #[serde(default = "default_cores_per_worker")]
    pub cores_per_worker: usize,
    /// Execution threads per worker
    #[serde(default = "default_threads_per_worker")]
    pub threads_per_worker: usize,
    /// Data source label for the report, e.g. the store provider
    pub source_name: String,
    /// System label for the report, e.g. the cluster name
    pub system_name: String,
    /// Storage format label for the report, e.g. zarr
    pub format: String,
}

/// Default data source interface.
fn default_interface() -> SourceKind {
    SourceKind::S3
}

/// Default CPU cores per worker.
fn default_cores_per_worker() -> usize {
    num_cpus::get_physical()
}

/// Default execution threads per worker.
fn default_threads_per_worker() -> usize {
    num_cpus::get()
}

/// Validate an array shape
fn validate_shape(shape: &[usize]) -> Result<(), ValidationError> {
    if shape.iter().any(|index| *index == 0) {
        return Err(ValidationError::new("shape indices must be greater than 0"));
    }
    Ok(())
}

/// Validate the worker count sweep
fn validate_worker_counts(worker_counts: &[usize]) -> Result<(), ValidationError> {
    if worker_counts.iter().any(|count| *count == 0) {
        return Err(ValidationError::new(
            "worker counts must be greater than 0",
        ));
    }
    Ok(())
}

impl BenchmarkPlan {
    /// Load and validate a plan from a JSON file.
    ///
    /// # Arguments
    ///
    /// * `path`: Path of the JSON plan file
    pub fn from_json_file(path: &Path) -> Result<Self, FetchBenchError> {
        let json = std::fs::read_to_string(path)?;
        let plan: Self = serde_json::from_str(&json)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Returns the [ChunkedDataset] described by the plan.
    pub fn dataset(&self) -> Result<ChunkedDataset, FetchBenchError> {
        ChunkedDataset::new(self.shape.clone(), self.chunk_shape.clone(), self.dtype)
    }

    /// Returns the [WorkerSpec] for the plan's workers.
    pub fn worker_spec(&self) -> WorkerSpec {
        WorkerSpec {
            ncores: self.cores_per_worker,
            nthreads: self.threads_per_worker,
        }
    }
}

/// Executes a [BenchmarkPlan] and accumulates its trial timings.
pub struct BenchmarkRunner {
    /// The plan being executed.
    plan: BenchmarkPlan,
    /// Source of chunk data.
    source: Arc<dyn DataSource>,
    /// Write target for fetched chunks.
    sink: Arc<dyn ChunkSink>,
    /// Worker pool registry.
    cluster: ClusterClient,
    /// Optional bound on in-flight fetched bytes.
    memory_limit: Option<usize>,
    /// Trial timings.
    timer: DiagnosticTimer,
}

impl BenchmarkRunner {
    /// Returns a new BenchmarkRunner for a validated plan.
    ///
    /// The data source is created from the plan and fetched chunks are
    /// discarded into a [DevNullStore].
    ///
    /// # Arguments
    ///
    /// * `plan`: The plan to execute
    /// * `credentials`: Object storage account credentials (S3 only)
    /// * `memory_limit`: Optional bound on in-flight fetched bytes
    pub async fn new(
        plan: BenchmarkPlan,
        credentials: S3Credentials,
        memory_limit: Option<usize>,
    ) -> Result<Self, FetchBenchError> {
        plan.validate()?;
        let source = source::create(plan.interface, &plan.source_url, &plan.bucket, credentials)
            .await?
            .into();
        Ok(Self::with_parts(plan, source, Arc::new(DevNullStore::new()), memory_limit))
    }

    /// Returns a new BenchmarkRunner over an existing source and sink.
    pub fn with_parts(
        plan: BenchmarkPlan,
        source: Arc<dyn DataSource>,
        sink: Arc<dyn ChunkSink>,
        memory_limit: Option<usize>,
    ) -> Self {
        Self {
            plan,
            source,
            sink,
            cluster: ClusterClient::new(),
            memory_limit,
            timer: DiagnosticTimer::new(),
        }
    }

    /// Execute the plan.
    ///
    /// For each worker count the cluster is scaled and awaited, then each
    /// trial fetches every chunk of the dataset and discards it, with the
    /// concurrency bounded by the pool's thread total. One timing record is
    /// produced per trial; a trial whose fetch fails still records the
    /// elapsed time up to the failure before the error propagates.
    ///
    /// Returns the accumulated [TrialTable].
    pub async fn run(&mut self) -> Result<TrialTable, FetchBenchError> {
        let dataset = self.plan.dataset()?;
        let chunks = dataset.chunks(&self.plan.prefix);
        tracing::info!(
            "Benchmarking {} chunks ({} bytes) from {}",
            chunks.len(),
            dataset.nbytes(),
            self.plan.source_url
        );
        for &nworkers in &self.plan.worker_counts {
            self.cluster.scale_to(nworkers, self.plan.worker_spec());
            self.cluster
                .wait_for_workers(nworkers, WORKER_WAIT_TIMEOUT)
                .await?;
            let nthreads = self.cluster.total_nthreads();
            for trial in 0..self.plan.trials {
                tracing::info!(
                    "Trial {}/{} with {} workers ({} threads)",
                    trial + 1,
                    self.plan.trials,
                    nworkers,
                    nthreads
                );
                let metadata = vec![
                    ("nworkers", MValue::from(nworkers)),
                    ("ncores", self.cluster.total_ncores().into()),
                    ("nthreads", nthreads.into()),
                    ("nbytes", dataset.nbytes().into()),
                    ("chunksize", get_chunksize(&dataset).into()),
                    ("nchunks", chunks.len().into()),
                    ("source", self.plan.source_name.as_str().into()),
                    ("system", self.plan.system_name.as_str().into()),
                    ("format", self.plan.format.as_str().into()),
                    ("trial", trial.into()),
                ];
                let guard = self.timer.time(metadata);
                let result = fetch_all(
                    &self.source,
                    &self.sink,
                    &chunks,
                    nthreads,
                    self.memory_limit,
                    self.plan.retries,
                )
                .await;
                // End the measurement before propagating any fetch error.
                drop(guard);
                result?;
            }
        }
        Ok(self.timer.dataframe())
    }

    /// Returns the trial timings accumulated so far.
    pub fn timer(&self) -> &DiagnosticTimer {
        &self.timer
    }
}

/// Fetch every chunk and write it to the sink.
///
/// Chunk fetches run concurrently on the tokio runtime, bounded by a
/// semaphore of `nthreads` permits and, when `memory_limit` is set, by a
/// semaphore of in-flight fetched bytes. Each chunk is retried up to
/// `retries` times before its error propagates.
async fn fetch_all(
    source: &Arc<dyn DataSource>,
    sink: &Arc<dyn ChunkSink>,
    chunks: &[ChunkSpec],
    nthreads: usize,
    memory_limit: Option<usize>,
    retries: u32,
) -> Result<(), FetchBenchError> {
    let threads = Arc::new(Semaphore::new(std::cmp::max(nthreads, 1)));
    let memory = memory_limit.map(|limit| Arc::new(Semaphore::new(limit)));
    if let Some(limit) = memory_limit {
        if let Some(chunk) = chunks.iter().find(|chunk| chunk.nbytes > limit) {
            return Err(FetchBenchError::InsufficientMemory {
                requested: chunk.nbytes,
                total: limit,
            });
        }
    }
    let mut tasks: JoinSet<Result<(), FetchBenchError>> = JoinSet::new();
    for chunk in chunks.iter().cloned() {
        let source = Arc::clone(source);
        let sink = Arc::clone(sink);
        let threads = Arc::clone(&threads);
        let memory = memory.clone();
        tasks.spawn(async move {
            let _thread_permit = threads.acquire().await?;
            let _memory_permit = match &memory {
                Some(semaphore) => Some(semaphore.acquire_many(chunk.nbytes.try_into()?).await?),
                None => None,
            };
            let data = fetch_with_retries(source.as_ref(), &chunk.key, retries).await?;
            sink.write_chunk(&chunk.index, data)
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.map_err(|error| FetchBenchError::TaskFailed {
            error: error.to_string(),
        })??;
    }
    Ok(())
}

/// Fetch one chunk, retrying on failure.
async fn fetch_with_retries(
    source: &dyn DataSource,
    key: &str,
    retries: u32,
) -> Result<Bytes, FetchBenchError> {
    let mut attempt = 0;
    loop {
        match source.fetch_chunk(key).await {
            Ok(data) => return Ok(data),
            Err(error) if attempt < retries => {
                attempt += 1;
                tracing::warn!(
                    "Retrying chunk {} after error (attempt {}/{}): {}",
                    key,
                    attempt,
                    retries,
                    error
                );
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    /// A source serving zeroed bytes, counting total fetches.
    #[derive(Debug, Default)]
    struct CountingSource {
        fetches: AtomicUsize,
        /// Number of leading fetches per run that fail.
        failures: AtomicUsize,
    }

    #[async_trait]
    impl DataSource for CountingSource {
        async fn fetch_chunk(&self, _key: &str) -> Result<Bytes, FetchBenchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(FetchBenchError::HttpContentLengthMissing);
            }
            Ok(Bytes::from(vec![0; 1024]))
        }
    }

    fn test_plan() -> BenchmarkPlan {
        BenchmarkPlan {
            source_url: Url::parse("http://localhost:9000").unwrap(),
            interface: SourceKind::S3,
            bucket: "data".to_string(),
            prefix: "dataset".to_string(),
            dtype: DType::Float32,
            shape: vec![64, 64],
            chunk_shape: vec![32, 32],
            worker_counts: vec![1, 2],
            trials: 2,
            retries: 0,
            cores_per_worker: 1,
            threads_per_worker: 2,
            source_name: "minio".to_string(),
            system_name: "test".to_string(),
            format: "zarr".to_string(),
        }
    }

    #[test]
    fn plan_validation() {
        let plan = test_plan();
        plan.validate().unwrap();
        let mut plan = test_plan();
        plan.worker_counts = vec![];
        assert!(plan.validate().is_err());
        let mut plan = test_plan();
        plan.worker_counts = vec![1, 0];
        assert!(plan.validate().is_err());
        let mut plan = test_plan();
        plan.trials = 0;
        assert!(plan.validate().is_err());
        let mut plan = test_plan();
        plan.shape = vec![64, 0];
        assert!(plan.validate().is_err());
    }

    #[test]
    fn plan_from_json() {
        let json = r#"{
            "source_url": "http://localhost:9000",
            "bucket": "data",
            "dtype": "float32",
            "shape": [64, 64],
            "chunk_shape": [32, 32],
            "worker_counts": [1, 2, 4],
            "trials": 3,
            "source_name": "minio",
            "system_name": "test",
            "format": "zarr"
        }"#;
        let plan: BenchmarkPlan = serde_json::from_str(json).unwrap();
        plan.validate().unwrap();
        assert_eq!(SourceKind::S3, plan.interface);
        assert_eq!(0, plan.retries);
        assert_eq!(DType::Float32, plan.dtype);
    }

    #[tokio::test]
    async fn run_records_one_row_per_trial() {
        let source = Arc::new(CountingSource::default());
        let mut runner = BenchmarkRunner::with_parts(
            test_plan(),
            Arc::clone(&source) as Arc<dyn DataSource>,
            Arc::new(DevNullStore::new()),
            None,
        );
        let table = runner.run().await.unwrap();
        // 2 worker counts x 2 trials.
        assert_eq!(4, table.len());
        assert_eq!(Some(&MValue::from(1)), table.get(0, "nworkers"));
        assert_eq!(Some(&MValue::from(2)), table.get(2, "nworkers"));
        assert_eq!(Some(&MValue::from(4)), table.get(2, "nthreads"));
        assert_eq!(Some(&MValue::from(16384)), table.get(0, "nbytes"));
        assert_eq!(Some(&MValue::from(4096)), table.get(0, "chunksize"));
        assert_eq!(Some(&MValue::from("minio")), table.get(0, "source"));
        // 4 chunks fetched per trial, 4 trials.
        assert_eq!(16, source.fetches.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn run_retries_failed_fetches() {
        let mut plan = test_plan();
        plan.worker_counts = vec![1];
        plan.trials = 1;
        plan.retries = 2;
        let source = Arc::new(CountingSource::default());
        source.failures.store(2, Ordering::SeqCst);
        let mut runner = BenchmarkRunner::with_parts(
            plan,
            Arc::clone(&source) as Arc<dyn DataSource>,
            Arc::new(DevNullStore::new()),
            None,
        );
        let table = runner.run().await.unwrap();
        assert_eq!(1, table.len());
        // 4 chunks plus 2 retried failures.
        assert_eq!(6, source.fetches.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn run_records_failed_trials() {
        let mut plan = test_plan();
        plan.worker_counts = vec![1];
        plan.trials = 1;
        let source = Arc::new(CountingSource::default());
        source.failures.store(usize::MAX, Ordering::SeqCst);
        let mut runner = BenchmarkRunner::with_parts(
            plan,
            Arc::clone(&source) as Arc<dyn DataSource>,
            Arc::new(DevNullStore::new()),
            None,
        );
        assert!(runner.run().await.is_err());
        // The failed trial still produced a record.
        assert_eq!(1, runner.timer().len());
    }

    #[tokio::test]
    async fn memory_limit_smaller_than_chunk() {
        let mut plan = test_plan();
        plan.worker_counts = vec![1];
        plan.trials = 1;
        let source = Arc::new(CountingSource::default());
        let mut runner = BenchmarkRunner::with_parts(
            plan,
            source as Arc<dyn DataSource>,
            Arc::new(DevNullStore::new()),
            Some(1024),
        );
        let result = runner.run().await;
        assert!(matches!(
            result,
            Err(FetchBenchError::InsufficientMemory {
                requested: 4096,
                total: 1024
            })
        ));
    }
}
