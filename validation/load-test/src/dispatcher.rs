//! Rate-limited request admission with linear ramp-up.
//!
//! A dispatcher ticks at `1 / rate` and offers one admission token per
//! tick to the workload's worker pool. While ramping up, a tick is only
//! offered with probability `elapsed / rampup`. Offers never block: when
//! no worker can take the token the tick is dropped.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Linear admission ramp from 0% to 100% over `duration`.
#[derive(Debug, Clone, Copy)]
pub struct RampUp {
    duration: Duration,
}

impl RampUp {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Admission probability after `elapsed`, within `[0, 1]`.
    pub fn admit_probability(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() || elapsed >= self.duration {
            return 1.0;
        }
        elapsed.as_secs_f64() / self.duration.as_secs_f64()
    }

    pub fn is_complete(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }

    /// Draw whether a tick at `elapsed` is admitted.
    pub fn should_admit(&self, elapsed: Duration, rng: &mut impl Rng) -> bool {
        let p = self.admit_probability(elapsed);
        p >= 1.0 || rng.gen_bool(p)
    }
}

/// Tick accounting for one dispatcher, returned when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub ticks: u64,
    /// Ticks skipped by the ramp-up draw
    pub ramp_skipped: u64,
    /// Tokens accepted by the worker pool
    pub admitted: u64,
    /// Tokens dropped because no worker was free
    pub dropped: u64,
}

/// Emits admission tokens for one workload.
pub struct Dispatcher {
    name: String,
    rate: u32,
    ramp: RampUp,
    tokens: mpsc::Sender<()>,
    rng: StdRng,
}

impl Dispatcher {
    /// `rate` is in requests per second and must be > 0.
    pub fn new(
        name: impl Into<String>,
        rate: u32,
        rampup: Duration,
        tokens: mpsc::Sender<()>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            name: name.into(),
            rate: rate.max(1),
            ramp: RampUp::new(rampup),
            tokens,
            rng,
        }
    }

    /// Time between ticks, never shorter than 1ns.
    pub fn tick_period(&self) -> Duration {
        (Duration::from_secs(1) / self.rate).max(Duration::from_nanos(1))
    }

    /// Tick until a shutdown signal arrives.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> DispatchStats {
        info!(
            workload = %self.name,
            rate = self.rate,
            "{}: starting load test with {} requests per second",
            self.name,
            self.rate
        );

        let period = self.tick_period();
        let start = Instant::now();
        let mut ticker = interval_at(start + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut stats = DispatchStats::default();
        let mut ramp_done = self.ramp.is_complete(Duration::ZERO);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }
            stats.ticks += 1;

            if !ramp_done {
                let elapsed = start.elapsed();
                if self.ramp.is_complete(elapsed) {
                    ramp_done = true;
                    info!(workload = %self.name, "{}: rampup done", self.name);
                } else if !self.ramp.should_admit(elapsed, &mut self.rng) {
                    stats.ramp_skipped += 1;
                    continue;
                }
            }

            match self.tokens.try_send(()) {
                Ok(()) => stats.admitted += 1,
                Err(TrySendError::Full(())) => stats.dropped += 1,
                Err(TrySendError::Closed(())) => break,
            }
        }

        debug!(
            workload = %self.name,
            ticks = stats.ticks,
            admitted = stats.admitted,
            dropped = stats.dropped,
            ramp_skipped = stats.ramp_skipped,
            "Dispatcher stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_capture::CapturedLogs;

    #[test]
    fn test_probability_is_linear() {
        let ramp = RampUp::new(Duration::from_secs(100));
        assert_eq!(ramp.admit_probability(Duration::ZERO), 0.0);
        assert!((ramp.admit_probability(Duration::from_secs(25)) - 0.25).abs() < 1e-9);
        assert_eq!(ramp.admit_probability(Duration::from_secs(100)), 1.0);
        assert_eq!(ramp.admit_probability(Duration::from_secs(500)), 1.0);
    }

    #[test]
    fn test_zero_rampup_admits_everything() {
        let ramp = RampUp::new(Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(ramp.is_complete(Duration::ZERO));
        assert!((0..100).all(|_| ramp.should_admit(Duration::ZERO, &mut rng)));
    }

    #[test]
    fn test_admission_rate_tracks_elapsed_fraction() {
        let ramp = RampUp::new(Duration::from_secs(60));
        let mut rng = StdRng::seed_from_u64(42);
        let draws = 20_000;

        for fraction in [0.1, 0.25, 0.5, 0.75, 0.9] {
            let elapsed = Duration::from_secs_f64(60.0 * fraction);
            let admitted = (0..draws)
                .filter(|_| ramp.should_admit(elapsed, &mut rng))
                .count();
            let observed = admitted as f64 / draws as f64;
            assert!(
                (observed - fraction).abs() < 0.02,
                "fraction {} observed {}",
                fraction,
                observed
            );
        }
    }

    #[test]
    fn test_tick_period() {
        let (tx, _rx) = mpsc::channel(1);
        let dispatcher = Dispatcher::new("upload", 4, Duration::ZERO, tx, Some(1));
        assert_eq!(dispatcher.tick_period(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_rate_still_ticks() {
        let (tx, mut rx) = mpsc::channel(1);
        let (shutdown, _) = broadcast::channel(1);
        let dispatcher = Dispatcher::new("upload", u32::MAX, Duration::ZERO, tx, Some(2));
        assert_eq!(dispatcher.tick_period(), Duration::from_nanos(1));

        let handle = tokio::spawn(dispatcher.run(shutdown.subscribe()));
        assert_eq!(rx.recv().await, Some(()));
        shutdown.send(()).unwrap();

        let stats = handle.await.unwrap();
        assert!(stats.admitted >= 1, "{:?}", stats);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_state_never_exceeds_rate() {
        let (tx, mut rx) = mpsc::channel(1);
        let (shutdown, _) = broadcast::channel(1);
        let dispatcher = Dispatcher::new("search", 10, Duration::ZERO, tx, Some(3));
        let handle = tokio::spawn(dispatcher.run(shutdown.subscribe()));

        let drain = tokio::spawn(async move {
            let mut received = 0u64;
            while rx.recv().await.is_some() {
                received += 1;
            }
            received
        });

        tokio::time::sleep(Duration::from_millis(5_050)).await;
        shutdown.send(()).unwrap();
        let stats = handle.await.unwrap();
        let received = drain.await.unwrap();

        assert!(stats.admitted <= 10 * 5 + 1, "{:?}", stats);
        assert!(stats.admitted >= 45, "{:?}", stats);
        assert_eq!(received, stats.admitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_pool_drops_ticks() {
        // Nobody receives: one token fits in the channel, the rest are dropped.
        let (tx, _rx) = mpsc::channel(1);
        let (shutdown, _) = broadcast::channel(1);
        let dispatcher = Dispatcher::new("upload", 100, Duration::ZERO, tx, Some(5));
        let handle = tokio::spawn(dispatcher.run(shutdown.subscribe()));

        tokio::time::sleep(Duration::from_millis(1_005)).await;
        shutdown.send(()).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.admitted + stats.dropped, stats.ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rampup_skips_early_ticks() {
        let (tx, mut rx) = mpsc::channel(1);
        let (shutdown, _) = broadcast::channel(1);
        let dispatcher =
            Dispatcher::new("ui", 100, Duration::from_secs(10), tx, Some(11));
        let handle = tokio::spawn(dispatcher.run(shutdown.subscribe()));
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        tokio::time::sleep(Duration::from_millis(10_005)).await;
        shutdown.send(()).unwrap();
        let stats = handle.await.unwrap();
        drain.await.unwrap();

        // Expected admission over a linear ramp is about half the ticks.
        let ratio = stats.admitted as f64 / stats.ticks as f64;
        assert!((0.4..0.6).contains(&ratio), "{:?}", stats);
        assert_eq!(stats.admitted + stats.ramp_skipped + stats.dropped, stats.ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rampup_done_logged_once() {
        let (logs, _guard) = CapturedLogs::install();
        let (tx, mut rx) = mpsc::channel(1);
        let (shutdown, _) = broadcast::channel(1);
        let dispatcher = Dispatcher::new("ui", 100, Duration::from_secs(1), tx, Some(13));
        let handle = tokio::spawn(dispatcher.run(shutdown.subscribe()));
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        tokio::time::sleep(Duration::from_secs(3)).await;
        shutdown.send(()).unwrap();
        let stats = handle.await.unwrap();
        drain.await.unwrap();

        // Two full seconds of ticks after the ramp, still a single line.
        assert!(stats.ticks >= 250, "{:?}", stats);
        assert_eq!(logs.count("ui: rampup done"), 1);
        assert_eq!(logs.count("ui: starting load test with 100 requests per second"), 1);
    }
}
