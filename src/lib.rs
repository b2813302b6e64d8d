//! This crate provides a benchmarking harness for measuring data-transfer
//! throughput from remote data sources, such as cloud object stores holding
//! chunked geospatial datasets, to the machine running the benchmark. Every
//! chunk of a dataset is fetched and discarded into a null sink, so the
//! measured cost is the fetch and transfer alone, and each trial is recorded
//! with its configuration metadata for tabular export.
//!
//! The harness is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime, schedules
//!   the concurrent chunk fetches.
//! * [AWS SDK for S3](aws_sdk_s3) is used to interact with S3-compatible
//!   object stores, and [reqwest] with plain HTTP(S) servers.
//! * [Serde](serde) deserialises JSON benchmark plans.
//! * [Clap](clap) provides the command line interface.

pub mod array;
pub mod bench;
pub mod cli;
pub mod cluster;
pub mod error;
pub mod http_source;
pub mod report;
pub mod s3_source;
pub mod sink;
pub mod source;
pub mod timer;
pub mod tracing;
pub mod types;
