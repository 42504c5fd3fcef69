//! Fixed-size worker pool for one workload.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::client::WorkloadClient;

/// Result of one executed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub duration: Duration,
    /// Rendered error message; `None` means success
    pub error: Option<String>,
}

impl Outcome {
    pub fn success(duration: Duration) -> Self {
        Self {
            duration,
            error: None,
        }
    }

    pub fn failure(duration: Duration, error: impl Into<String>) -> Self {
        Self {
            duration,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Receiving side of a dispatcher's admission tokens, shared by all workers.
pub type TokenReceiver = Arc<Mutex<mpsc::Receiver<()>>>;

/// Workers that turn admission tokens into requests.
pub struct WorkerPool {
    name: String,
    size: usize,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Spawn the workers.
    ///
    /// Each worker waits for a token or for shutdown. A request that has
    /// already started runs to completion and its outcome is still sent.
    pub fn spawn(
        &self,
        client: Arc<dyn WorkloadClient>,
        tokens: TokenReceiver,
        outcomes: mpsc::UnboundedSender<Outcome>,
        shutdown: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<()>> {
        (0..self.size)
            .map(|worker_id| {
                let name = self.name.clone();
                let client = client.clone();
                let tokens = tokens.clone();
                let outcomes = outcomes.clone();
                let shutdown = shutdown.subscribe();
                tokio::spawn(async move {
                    run_worker(&name, worker_id, client, tokens, outcomes, shutdown).await
                })
            })
            .collect()
    }
}

async fn run_worker(
    name: &str,
    worker_id: usize,
    client: Arc<dyn WorkloadClient>,
    tokens: TokenReceiver,
    outcomes: mpsc::UnboundedSender<Outcome>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let token = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            token = async { tokens.lock().await.recv().await } => token,
        };
        if token.is_none() {
            break;
        }

        let start = Instant::now();
        let result = client.execute().await;
        let duration = start.elapsed();
        let outcome = match result {
            Ok(()) => Outcome::success(duration),
            Err(e) => Outcome::failure(duration, e.to_string()),
        };

        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    trace!(workload = %name, worker_id, "Worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoadTestError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl WorkloadClient for CountingClient {
        async fn execute(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                Err(LoadTestError::UnexpectedStatus { code: 500 })
            } else {
                Ok(())
            }
        }
    }

    fn client(fail: bool) -> Arc<CountingClient> {
        Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_token_produces_one_outcome() {
        let (token_tx, token_rx) = mpsc::channel(1);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = broadcast::channel(1);
        let client = client(true);

        let handles = WorkerPool::new("upload", 2).spawn(
            client.clone(),
            Arc::new(Mutex::new(token_rx)),
            outcome_tx,
            &shutdown,
        );

        token_tx.send(()).await.unwrap();
        let outcome = outcome_rx.recv().await.unwrap();
        assert_eq!(outcome.error.as_deref(), Some("unexpected status code: 500"));
        assert!(outcome.duration >= Duration::from_millis(20));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        shutdown.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_idle_workers_exit_on_shutdown() {
        let (_token_tx, token_rx) = mpsc::channel(1);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = broadcast::channel(1);
        let client = client(false);

        let handles = WorkerPool::new("search", 5).spawn(
            client.clone(),
            Arc::new(Mutex::new(token_rx)),
            outcome_tx,
            &shutdown,
        );
        assert_eq!(handles.len(), 5);
        tokio::task::yield_now().await;

        shutdown.send(()).unwrap();
        let joined = tokio::time::timeout(
            Duration::from_millis(100),
            futures::future::join_all(handles),
        )
        .await
        .expect("workers did not exit after shutdown");
        assert!(joined.iter().all(|r| r.is_ok()));

        // Every sender is gone and nothing was reported.
        assert!(outcome_rx.recv().await.is_none());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_in_flight_request_completes_after_shutdown() {
        let (token_tx, token_rx) = mpsc::channel(1);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = broadcast::channel(1);
        let client = client(false);

        let handles = WorkerPool::new("download", 1).spawn(
            client.clone(),
            Arc::new(Mutex::new(token_rx)),
            outcome_tx,
            &shutdown,
        );

        token_tx.send(()).await.unwrap();
        while client.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        shutdown.send(()).unwrap();

        let outcome = outcome_rx.recv().await.unwrap();
        assert!(outcome.is_success());
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(outcome_rx.recv().await.is_none());
    }
}
