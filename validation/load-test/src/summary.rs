//! Cumulative per-workload totals and the end-of-run report.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pool::Outcome;

/// Everything a workload's reporter saw over the whole run.
pub struct WorkloadTotals {
    name: String,
    histogram: Histogram<u64>,
    requests_total: u64,
    requests_failed: u64,
}

impl WorkloadTotals {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            histogram: Histogram::new(3).expect("Failed to create histogram"),
            requests_total: 0,
            requests_failed: 0,
        }
    }

    pub fn record(&mut self, outcome: &Outcome) {
        self.requests_total += 1;
        if !outcome.is_success() {
            self.requests_failed += 1;
        }
        let latency_us = outcome.duration.as_micros().min(u64::MAX as u128) as u64;
        self.histogram.record(latency_us.max(1)).ok();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total(&self) -> u64 {
        self.requests_total
    }

    pub fn failures(&self) -> u64 {
        self.requests_failed
    }

    /// Summarize over a run of length `elapsed`.
    pub fn summarize(&self, elapsed: Duration) -> WorkloadSummary {
        let secs = elapsed.as_secs_f64();
        let empty = self.requests_total == 0;
        let ms = |us: u64| if empty { 0.0 } else { us as f64 / 1000.0 };

        WorkloadSummary {
            workload: self.name.clone(),
            total_requests: self.requests_total,
            successful_requests: self.requests_total - self.requests_failed,
            failed_requests: self.requests_failed,
            requests_per_second: if secs > 0.0 {
                self.requests_total as f64 / secs
            } else {
                0.0
            },
            latency_p50: ms(self.histogram.value_at_quantile(0.50)),
            latency_p90: ms(self.histogram.value_at_quantile(0.90)),
            latency_p99: ms(self.histogram.value_at_quantile(0.99)),
            latency_max: ms(self.histogram.max()),
            latency_avg: if empty { 0.0 } else { self.histogram.mean() / 1000.0 },
        }
    }
}

/// Final numbers for one workload (latencies in ms).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub workload: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub requests_per_second: f64,
    pub latency_p50: f64,
    pub latency_p90: f64,
    pub latency_p99: f64,
    pub latency_max: f64,
    pub latency_avg: f64,
}

impl WorkloadSummary {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        (self.successful_requests as f64 / self.total_requests as f64) * 100.0
    }
}

/// Final run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: String,
    pub target: String,
    pub duration_secs: f64,
    pub workers: usize,
    pub workloads: Vec<WorkloadSummary>,
}

impl RunSummary {
    pub fn new(
        target: impl Into<String>,
        elapsed: Duration,
        workers: usize,
        totals: &[WorkloadTotals],
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            target: target.into(),
            duration_secs: elapsed.as_secs_f64(),
            workers,
            workloads: totals.iter().map(|t| t.summarize(elapsed)).collect(),
        }
    }

    /// Format as a console table.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                "Workload",
                "Requests",
                "Success",
                "Req/s",
                "Latency ms (avg / p50 / p90 / p99 / max)",
            ]);

        for w in &self.workloads {
            table.add_row(vec![
                w.workload.clone(),
                w.total_requests.to_string(),
                format!("{:.1}%", w.success_rate()),
                format!("{:.1}", w.requests_per_second),
                format!(
                    "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
                    w.latency_avg, w.latency_p50, w.latency_p90, w.latency_p99, w.latency_max
                ),
            ]);
        }

        format!(
            "Load test against {} ({:.1}s, {} workers per workload)\n{}",
            self.target, self.duration_secs, self.workers, table
        )
    }

    /// Format as JSON.
    pub fn format_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_count_failures() {
        let mut totals = WorkloadTotals::new("search");
        totals.record(&Outcome::success(Duration::from_millis(10)));
        totals.record(&Outcome::success(Duration::from_millis(30)));
        totals.record(&Outcome::failure(Duration::from_millis(5), "boom"));

        let summary = totals.summarize(Duration::from_secs(3));
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.failed_requests, 1);
        assert!((summary.requests_per_second - 1.0).abs() < 1e-9);
        assert!((summary.latency_max - 30.0).abs() < 0.1);
        assert!((summary.success_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_empty_totals() {
        let summary = WorkloadTotals::new("ui").summarize(Duration::from_secs(1));
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.latency_p99, 0.0);
        assert_eq!(summary.success_rate(), 0.0);
    }

    #[test]
    fn test_report_formats() {
        let mut totals = WorkloadTotals::new("upload");
        totals.record(&Outcome::success(Duration::from_millis(12)));
        let run = RunSummary::new("http://127.0.0.1:8080", Duration::from_secs(1), 4, &[totals]);

        let table = run.format_table();
        assert!(table.contains("upload"));
        assert!(table.contains("100.0%"));

        let json: serde_json::Value = serde_json::from_str(&run.format_json().unwrap()).unwrap();
        assert_eq!(json["workloads"][0]["workload"], "upload");
        assert_eq!(json["workers"], 4);
    }
}
