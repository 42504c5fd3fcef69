//! Configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LoadTestError, Result};

/// Highest per-workload rate whose tick period is still at least 1ns.
pub const MAX_RATE: u32 = 1_000_000_000;

/// Main test configuration, loaded from a YAML scenario and/or CLI flags.
///
/// Every field is optional in the scenario file; missing fields take the
/// values from [`TestConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Root of the fixture corpus (images grouped by category directory)
    pub images_path: PathBuf,
    /// Host under test, `host[:port]` or a full URL
    pub target_host: String,
    /// Requests per second for each workload; 0 disables it
    pub upload_rate: u32,
    pub ui_rate: u32,
    pub search_rate: u32,
    pub download_rate: u32,
    #[serde(with = "humantime_serde")]
    pub test_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub rampup_time: Duration,
    /// Number of distinct synthetic users
    pub user_count: u32,
    /// Worker pool size for each enabled workload
    pub workers: usize,
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Capacity of the search -> download identifier ring
    pub ring_capacity: usize,
    /// Chance that a download fetches the full-size image instead of the thumbnail
    pub full_size_probability: f64,
    pub seed: Option<u64>, // Optional RNG seed for reproducible ramp-up admission
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            images_path: PathBuf::from("data"),
            target_host: "127.0.0.1".to_string(),
            upload_rate: 1,
            ui_rate: 1,
            search_rate: 1,
            download_rate: 1,
            test_duration: Duration::from_secs(10 * 60),
            rampup_time: Duration::from_secs(2 * 60),
            user_count: 1000,
            workers: 200,
            report_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            ring_capacity: 1000,
            full_size_probability: 0.01,
            seed: None,
        }
    }
}

impl TestConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TestConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(invalid("workers must be > 0"));
        }
        if self.user_count == 0 {
            return Err(invalid("user_count must be > 0"));
        }
        if self.report_interval.is_zero() {
            return Err(invalid("report_interval must be > 0"));
        }
        if self.ring_capacity == 0 {
            return Err(invalid("ring_capacity must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.full_size_probability) {
            return Err(invalid("full_size_probability must be within [0, 1]"));
        }
        let rates = [
            self.upload_rate,
            self.ui_rate,
            self.search_rate,
            self.download_rate,
        ];
        if rates.iter().all(|&rate| rate == 0) {
            return Err(invalid("at least one workload rate must be > 0"));
        }
        if rates.iter().any(|&rate| rate > MAX_RATE) {
            return Err(LoadTestError::InvalidConfig(format!(
                "workload rates must be <= {} per second",
                MAX_RATE
            )));
        }
        Ok(())
    }

    /// Base URL for requests against the target, without a trailing slash.
    pub fn base_url(&self) -> String {
        let host = self.target_host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        }
    }

    /// Total wall-clock time of a run.
    pub fn total_duration(&self) -> Duration {
        self.rampup_time + self.test_duration
    }
}

fn invalid(message: &str) -> LoadTestError {
    LoadTestError::InvalidConfig(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TestConfig::default();
        assert_eq!(config.images_path, PathBuf::from("data"));
        assert_eq!(config.workers, 200);
        assert_eq!(config.total_duration(), Duration::from_secs(12 * 60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
target_host: "images.internal:8080"
search_rate: 20
rampup_time: 30s
test_duration: 5m
"#;
        let config: TestConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.target_host, "images.internal:8080");
        assert_eq!(config.search_rate, 20);
        assert_eq!(config.upload_rate, 1);
        assert_eq!(config.rampup_time, Duration::from_secs(30));
        assert_eq!(config.test_duration, Duration::from_secs(300));
        assert_eq!(config.report_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_bundled_scenarios_are_valid() {
        for name in ["smoke.yaml", "steady.yaml"] {
            let path = Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("scenarios")
                .join(name);
            let config = TestConfig::from_file(&path).unwrap();
            assert!(config.validate().is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_base_url() {
        let mut config = TestConfig::default();
        config.target_host = "10.0.0.5:8080/".to_string();
        assert_eq!(config.base_url(), "http://10.0.0.5:8080");

        config.target_host = "https://images.example.com".to_string();
        assert_eq!(config.base_url(), "https://images.example.com");
    }

    #[test]
    fn test_validate_rejects_all_disabled() {
        let config = TestConfig {
            upload_rate: 0,
            ui_rate: 0,
            search_rate: 0,
            download_rate: 0,
            ..TestConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadTestError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_sub_nanosecond_rate() {
        let config = TestConfig {
            upload_rate: 2_000_000_000,
            ..TestConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadTestError::InvalidConfig(_))
        ));

        let config = TestConfig {
            upload_rate: MAX_RATE,
            ..TestConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = TestConfig {
            workers: 0,
            ..TestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_probability() {
        let config = TestConfig {
            full_size_probability: 1.5,
            ..TestConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
