//! Load test orchestration.
//!
//! Wires one dispatcher, worker pool and reporter per enabled workload,
//! runs them for `rampup_time + test_duration` (or until shutdown is
//! requested), then broadcasts shutdown and waits for in-flight requests.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::client::{
    BrowseClient, DownloadClient, SearchClient, UploadClient, Users, WorkloadClient, WorkloadKind,
};
use crate::config::TestConfig;
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::error::{LoadTestError, Result};
use crate::pool::WorkerPool;
use crate::reporter::Reporter;
use crate::ring::DiscoveryRing;
use crate::summary::{RunSummary, WorkloadTotals};

/// Tasks belonging to one running workload.
struct WorkloadTasks {
    dispatcher: JoinHandle<DispatchStats>,
    workers: Vec<JoinHandle<()>>,
    reporter: JoinHandle<WorkloadTotals>,
}

/// Executes a load test against one target.
pub struct LoadRunner {
    http: reqwest::Client,
    config: TestConfig,
}

impl LoadRunner {
    /// Create a new load runner.
    pub fn new(config: TestConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.workers)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Probe the landing page once. Any failure is fatal to the run.
    pub async fn check_host(&self) -> Result<()> {
        BrowseClient::new(self.http.clone(), self.config.base_url())
            .execute()
            .await
            .map_err(|e| LoadTestError::LivenessCheckFailed {
                host: self.config.target_host.clone(),
                source: Box::new(e),
            })
    }

    /// Rate configured for a workload; 0 means disabled.
    pub fn rate_for(&self, kind: WorkloadKind) -> u32 {
        match kind {
            WorkloadKind::Upload => self.config.upload_rate,
            WorkloadKind::Browse => self.config.ui_rate,
            WorkloadKind::Search => self.config.search_rate,
            WorkloadKind::Download => self.config.download_rate,
        }
    }

    /// Run the load test until the configured duration elapses or a
    /// shutdown signal is sent on `shutdown`.
    pub async fn run(&self, shutdown: broadcast::Sender<()>) -> Result<RunSummary> {
        let mut stop = shutdown.subscribe();
        let catalog = Arc::new(Catalog::load(&self.config.images_path)?);
        info!(
            fixtures = catalog.len(),
            path = %self.config.images_path.display(),
            "loaded {} images from: {}",
            catalog.len(),
            self.config.images_path.display()
        );

        self.check_host().await?;
        info!(host = %self.config.target_host, "target host is alive: {}", self.config.target_host);

        let ring = Arc::new(DiscoveryRing::new(self.config.ring_capacity));
        let start = Instant::now();

        let mut running = Vec::new();
        for (index, kind) in WorkloadKind::ALL.into_iter().enumerate() {
            let rate = self.rate_for(kind);
            if rate == 0 {
                continue;
            }
            let client = self.build_client(kind, &catalog, &ring);
            let seed = self.config.seed.map(|s| s.wrapping_add(index as u64));
            running.push(self.spawn_workload(kind, client, rate, seed, &shutdown));
        }

        tokio::select! {
            _ = tokio::time::sleep(self.config.total_duration()) => {
                info!("Test duration elapsed, shutting down");
            }
            _ = stop.recv() => {
                info!("Shutdown requested, stopping early");
            }
        }
        shutdown.send(()).ok();

        let mut totals = Vec::with_capacity(running.len());
        for tasks in running {
            if let Err(e) = tasks.dispatcher.await {
                error!(error = %e, "Dispatcher task failed");
            }
            for result in join_all(tasks.workers).await {
                if let Err(e) = result {
                    error!(error = %e, "Worker task failed");
                }
            }
            match tasks.reporter.await {
                Ok(t) => totals.push(t),
                Err(e) => error!(error = %e, "Reporter task failed"),
            }
        }

        Ok(RunSummary::new(
            self.config.base_url(),
            start.elapsed(),
            self.config.workers,
            &totals,
        ))
    }

    fn build_client(
        &self,
        kind: WorkloadKind,
        catalog: &Arc<Catalog>,
        ring: &Arc<DiscoveryRing>,
    ) -> Arc<dyn WorkloadClient> {
        let http = self.http.clone();
        let base_url = self.config.base_url();
        match kind {
            WorkloadKind::Upload => Arc::new(UploadClient::new(
                http,
                base_url,
                catalog.clone(),
                Users::new(self.config.user_count),
            )),
            WorkloadKind::Browse => Arc::new(BrowseClient::new(http, base_url)),
            WorkloadKind::Search => Arc::new(SearchClient::new(
                http,
                base_url,
                catalog.categories(),
                ring.clone(),
            )),
            WorkloadKind::Download => Arc::new(DownloadClient::new(
                http,
                base_url,
                ring.clone(),
                self.config.full_size_probability,
            )),
        }
    }

    fn spawn_workload(
        &self,
        kind: WorkloadKind,
        client: Arc<dyn WorkloadClient>,
        rate: u32,
        seed: Option<u64>,
        shutdown: &broadcast::Sender<()>,
    ) -> WorkloadTasks {
        let name = kind.name();
        let (token_tx, token_rx) = mpsc::channel(1);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let reporter = Reporter::new(name, self.config.report_interval, outcome_rx);
        let reporter = tokio::spawn(reporter.run(shutdown.subscribe()));

        let workers = WorkerPool::new(name, self.config.workers).spawn(
            client,
            Arc::new(Mutex::new(token_rx)),
            outcome_tx,
            shutdown,
        );

        let dispatcher = Dispatcher::new(name, rate, self.config.rampup_time, token_tx, seed);
        let dispatcher = tokio::spawn(dispatcher.run(shutdown.subscribe()));

        WorkloadTasks {
            dispatcher,
            workers,
            reporter,
        }
    }
}

/// Run with a shutdown signal that also fires on Ctrl+C.
pub async fn run_until_ctrl_c(runner: &LoadRunner) -> Result<RunSummary> {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            shutdown_tx_clone.send(()).ok();
        }
    });

    let result = runner.run(shutdown_tx).await;
    signal_task.abort();
    result
}
