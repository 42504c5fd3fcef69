//! Periodic per-workload latency and error reporting.
//!
//! A reporter collects outcomes into a window and, on every tick, logs
//! throughput, mean and p99 latency plus one line per distinct error,
//! then clears the window. On shutdown the partial window is discarded.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::pool::Outcome;
use crate::summary::WorkloadTotals;

/// Default flush period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Statistics for one flushed window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub count: usize,
    pub elapsed: Duration,
    pub requests_per_second: f64,
    pub avg: Option<Duration>,
    pub p99: Option<Duration>,
    pub error_count: usize,
    /// Distinct error messages, most frequent first
    pub errors: Vec<(String, usize)>,
}

impl WindowStats {
    /// Summarize `window`, sorting it by duration in place.
    pub fn from_window(window: &mut [Outcome], elapsed: Duration) -> Self {
        let count = window.len();
        let secs = elapsed.as_secs_f64();
        let requests_per_second = if secs > 0.0 {
            count as f64 / secs
        } else {
            0.0
        };

        let mut by_message: HashMap<&str, usize> = HashMap::new();
        for outcome in window.iter() {
            if let Some(message) = outcome.error.as_deref() {
                *by_message.entry(message).or_insert(0) += 1;
            }
        }
        let error_count = by_message.values().sum();
        let mut errors: Vec<(String, usize)> = by_message
            .into_iter()
            .map(|(message, n)| (message.to_string(), n))
            .collect();
        errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let (avg, p99) = if count > 0 {
            window.sort_by_key(|o| o.duration);
            let total: Duration = window.iter().map(|o| o.duration).sum();
            (Some(total / count as u32), Some(window[p99_index(count)].duration))
        } else {
            (None, None)
        };

        Self {
            count,
            elapsed,
            requests_per_second,
            avg,
            p99,
            error_count,
            errors,
        }
    }

    /// The summary log line, e.g. `upload: 9.8 req/s, avg 41ms, p99 120ms, 2 errors`.
    pub fn summary_line(&self, name: &str) -> String {
        let mut line = format!("{}: {:.1} req/s", name, self.requests_per_second);
        if let (Some(avg), Some(p99)) = (self.avg, self.p99) {
            line.push_str(&format!(
                ", avg {}ms, p99 {}ms, {} errors",
                avg.as_millis(),
                p99.as_millis(),
                self.error_count
            ));
        }
        line
    }

    /// One line per distinct error message.
    pub fn error_lines(&self, name: &str) -> Vec<String> {
        self.errors
            .iter()
            .map(|(message, n)| {
                if *n == 1 {
                    format!("{}: {}", name, message)
                } else {
                    format!("{}: {} ({} times)", name, message, n)
                }
            })
            .collect()
    }
}

/// Index of the 99th percentile in a sorted window of `count` items.
pub fn p99_index(count: usize) -> usize {
    (count * 99 / 100).min(count.saturating_sub(1))
}

/// Aggregates outcomes for one workload.
pub struct Reporter {
    name: String,
    interval: Duration,
    outcomes: mpsc::UnboundedReceiver<Outcome>,
}

impl Reporter {
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        outcomes: mpsc::UnboundedReceiver<Outcome>,
    ) -> Self {
        Self {
            name: name.into(),
            interval,
            outcomes,
        }
    }

    /// Run until a shutdown signal arrives, returning cumulative totals for
    /// every outcome received.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> WorkloadTotals {
        let mut totals = WorkloadTotals::new(&self.name);
        let mut window: Vec<Outcome> = Vec::new();
        let mut window_start = Instant::now();
        let mut ticker = interval_at(window_start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let stats = WindowStats::from_window(&mut window, window_start.elapsed());
                    self.log(&stats);
                    window.clear();
                    window_start = Instant::now();
                }
                outcome = self.outcomes.recv() => match outcome {
                    Some(outcome) => {
                        totals.record(&outcome);
                        window.push(outcome);
                    }
                    // All workers gone; nothing more can arrive.
                    None => {
                        let _ = shutdown.recv().await;
                        break;
                    }
                },
            }
        }

        totals
    }

    fn log(&self, stats: &WindowStats) {
        info!(
            workload = %self.name,
            rps = stats.requests_per_second,
            avg_ms = stats.avg.map(|d| d.as_millis() as u64),
            p99_ms = stats.p99.map(|d| d.as_millis() as u64),
            errors = stats.error_count,
            "{}",
            stats.summary_line(&self.name)
        );
        for line in stats.error_lines(&self.name) {
            warn!(workload = %self.name, "{}", line);
        }
    }
}
