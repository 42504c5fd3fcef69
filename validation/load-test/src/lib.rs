//! Synthetic traffic generator for the image server.
//!
//! This crate drives four independent workloads against a target host:
//! - `upload`: multipart image uploads from a fixture corpus
//! - `ui`: landing page fetches (also the pre-run liveness probe)
//! - `search`: keyword searches that discover download targets
//! - `download`: fetches of discovered thumbnails and full-size images
//!
//! Each workload gets its own rate-limited dispatcher with linear ramp-up,
//! a fixed pool of workers and a reporter that logs throughput, mean and
//! p99 latency and an error histogram every reporting interval.

pub mod catalog;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
#[cfg(test)]
mod log_capture;
pub mod pool;
pub mod reporter;
pub mod ring;
pub mod runner;
pub mod summary;

pub use catalog::{Catalog, Fixture};
pub use client::{WorkloadClient, WorkloadKind};
pub use config::TestConfig;
pub use dispatcher::{DispatchStats, Dispatcher, RampUp};
pub use error::{LoadTestError, Result};
pub use pool::{Outcome, WorkerPool};
pub use reporter::{Reporter, WindowStats};
pub use ring::DiscoveryRing;
pub use runner::LoadRunner;
pub use summary::{RunSummary, WorkloadSummary, WorkloadTotals};
