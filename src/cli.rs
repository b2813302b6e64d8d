//! Command Line Interface (CLI) arguments.

use crate::bench::BenchmarkPlan;
use crate::error::FetchBenchError;
use crate::s3_source::S3Credentials;
use crate::source::SourceKind;
use crate::types::DType;

use std::path::PathBuf;

use clap::Parser;
use url::Url;
use validator::{Validate, ValidationError};

/// fetchbench command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// Path to a JSON benchmark plan; overrides the plan arguments below
    #[arg(long, env = "FETCHBENCH_PLAN")]
    pub plan: Option<PathBuf>,
    /// URL of the data source: store endpoint for S3, base URL for HTTP
    #[arg(long, env = "FETCHBENCH_SOURCE_URL", required_unless_present = "plan")]
    pub source_url: Option<Url>,
    /// Data source interface
    #[arg(long, value_enum, default_value_t = SourceKind::S3, env = "FETCHBENCH_INTERFACE")]
    pub interface: SourceKind,
    /// Bucket containing the chunk objects (S3 only)
    #[arg(long, default_value = "", env = "FETCHBENCH_BUCKET")]
    pub bucket: String,
    /// Object key prefix of the dataset within the source
    #[arg(long, default_value = "", env = "FETCHBENCH_PREFIX")]
    pub prefix: String,
    /// Element data type of the dataset
    #[arg(long, value_enum, default_value_t = DType::Float32, env = "FETCHBENCH_DTYPE")]
    pub dtype: DType,
    /// Shape of the dataset, comma separated
    #[arg(long, value_delimiter = ',', required_unless_present = "plan")]
    pub shape: Vec<usize>,
    /// Shape of one chunk, comma separated
    #[arg(long, value_delimiter = ',', required_unless_present = "plan")]
    pub chunk_shape: Vec<usize>,
    /// Worker counts to sweep over, comma separated
    #[arg(long, value_delimiter = ',', default_value = "1,2,4,8")]
    pub worker_counts: Vec<usize>,
    /// Number of trials per worker count
    #[arg(long, default_value_t = 3, env = "FETCHBENCH_TRIALS")]
    pub trials: u32,
    /// Number of times to retry a failed chunk fetch
    #[arg(long, default_value_t = 2, env = "FETCHBENCH_RETRIES")]
    pub retries: u32,
    /// CPU cores per worker; defaults to the physical core count
    #[arg(long, env = "FETCHBENCH_CORES_PER_WORKER")]
    pub cores_per_worker: Option<usize>,
    /// Execution threads per worker; defaults to the logical core count
    #[arg(long, env = "FETCHBENCH_THREADS_PER_WORKER")]
    pub threads_per_worker: Option<usize>,
    /// Data source label used in the report, e.g. the store provider
    #[arg(long, default_value = "s3", env = "FETCHBENCH_SOURCE_NAME")]
    pub source_name: String,
    /// System label used in the report, e.g. the cluster name
    #[arg(long, default_value = "local", env = "FETCHBENCH_SYSTEM_NAME")]
    pub system_name: String,
    /// Storage format label used in the report
    #[arg(long, default_value = "zarr", env = "FETCHBENCH_FORMAT")]
    pub format: String,
    /// Object storage access key (S3 only)
    #[arg(long, env = "FETCHBENCH_ACCESS_KEY")]
    pub access_key: Option<String>,
    /// Object storage secret key (S3 only)
    #[arg(long, env = "FETCHBENCH_SECRET_KEY")]
    pub secret_key: Option<String>,
    /// Optional bound on in-flight fetched bytes, e.g. 8GiB
    #[arg(long, env = "FETCHBENCH_MEMORY_LIMIT")]
    pub memory_limit: Option<String>,
    /// Directory to write the CSV report into
    #[arg(long, default_value = "./results", env = "FETCHBENCH_OUTPUT_DIR")]
    pub output_dir: String,
}

impl CommandLineArgs {
    /// Returns the validated [BenchmarkPlan] for these arguments.
    ///
    /// When `--plan` is given the plan file wins; otherwise the plan is built
    /// from the individual arguments.
    pub fn benchmark_plan(&self) -> Result<BenchmarkPlan, FetchBenchError> {
        if let Some(path) = &self.plan {
            return BenchmarkPlan::from_json_file(path);
        }
        let source_url = self
            .source_url
            .clone()
            .ok_or_else(|| ValidationError::new("source-url is required without a plan file"))?;
        let plan = BenchmarkPlan {
            source_url,
            interface: self.interface,
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            dtype: self.dtype,
            shape: self.shape.clone(),
            chunk_shape: self.chunk_shape.clone(),
            worker_counts: self.worker_counts.clone(),
            trials: self.trials,
            retries: self.retries,
            cores_per_worker: self.cores_per_worker.unwrap_or_else(num_cpus::get_physical),
            threads_per_worker: self.threads_per_worker.unwrap_or_else(num_cpus::get),
            source_name: self.source_name.clone(),
            system_name: self.system_name.clone(),
            format: self.format.clone(),
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Returns the object storage credentials for these arguments.
    pub fn credentials(&self) -> S3Credentials {
        match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                S3Credentials::access_key(access_key, secret_key)
            }
            _ => S3Credentials::None,
        }
    }

    /// Returns the parsed in-flight memory limit in bytes, if set.
    pub fn memory_limit(&self) -> Result<Option<usize>, FetchBenchError> {
        match &self.memory_limit {
            Some(limit) => {
                let bytes = byte_unit::Byte::parse_str(limit, true).map_err(|error| {
                    FetchBenchError::InvalidMemoryLimit {
                        error: error.to_string(),
                    }
                })?;
                Ok(Some(bytes.as_u64().try_into()?))
            }
            None => Ok(None),
        }
    }
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> CommandLineArgs {
        CommandLineArgs::try_parse_from(
            std::iter::once("fetchbench").chain(args.iter().copied()),
        )
        .unwrap()
    }

    #[test]
    fn plan_from_args() {
        let args = parse_args(&[
            "--source-url",
            "http://localhost:9000",
            "--bucket",
            "data",
            "--shape",
            "100,100",
            "--chunk-shape",
            "50,50",
            "--worker-counts",
            "1,2",
        ]);
        let plan = args.benchmark_plan().unwrap();
        assert_eq!(vec![100, 100], plan.shape);
        assert_eq!(vec![1, 2], plan.worker_counts);
        assert_eq!(SourceKind::S3, plan.interface);
        assert_eq!(2, plan.retries);
    }

    #[test]
    fn source_url_required_without_plan() {
        let result = CommandLineArgs::try_parse_from(["fetchbench", "--shape", "10"]);
        assert!(result.is_err());
    }

    #[test]
    fn credentials() {
        let args = parse_args(&[
            "--source-url",
            "http://localhost:9000",
            "--shape",
            "10",
            "--chunk-shape",
            "10",
            "--access-key",
            "user",
            "--secret-key",
            "password",
        ]);
        assert!(matches!(
            args.credentials(),
            S3Credentials::AccessKey { .. }
        ));
    }

    #[test]
    fn memory_limit() {
        let mut args = parse_args(&[
            "--source-url",
            "http://localhost:9000",
            "--shape",
            "10",
            "--chunk-shape",
            "10",
        ]);
        assert_eq!(None, args.memory_limit().unwrap());
        args.memory_limit = Some("1 KiB".to_string());
        assert_eq!(Some(1024), args.memory_limit().unwrap());
        args.memory_limit = Some("bogus".to_string());
        assert!(args.memory_limit().is_err());
    }
}
