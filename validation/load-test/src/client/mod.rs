//! Workload clients.
//!
//! Each client knows how to build one request against the image server and
//! how to judge its response. Clients are shared by every worker of their
//! workload, so they hold no per-request state.

mod browse;
mod download;
mod search;
mod upload;

pub use browse::{BrowseClient, LIVENESS_MARKER};
pub use download::{full_size_path, DownloadClient, THUMBNAIL_PREFIX};
pub use search::SearchClient;
pub use upload::{UploadClient, Users};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{LoadTestError, Result};

/// One kind of synthetic request.
#[async_trait]
pub trait WorkloadClient: Send + Sync {
    /// Perform one request/response exchange.
    async fn execute(&self) -> Result<()>;
}

/// The four workloads the harness drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Upload,
    Browse,
    Search,
    Download,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 4] = [
        WorkloadKind::Upload,
        WorkloadKind::Browse,
        WorkloadKind::Search,
        WorkloadKind::Download,
    ];

    /// Name used in log lines and reports.
    pub fn name(&self) -> &'static str {
        match self {
            WorkloadKind::Upload => "upload",
            WorkloadKind::Browse => "ui",
            WorkloadKind::Search => "search",
            WorkloadKind::Download => "download",
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything but 200 is a failure.
fn expect_ok(status: StatusCode) -> Result<()> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(LoadTestError::UnexpectedStatus {
            code: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_ok() {
        assert!(expect_ok(StatusCode::OK).is_ok());
        assert!(matches!(
            expect_ok(StatusCode::CREATED),
            Err(LoadTestError::UnexpectedStatus { code: 201 })
        ));
    }

    #[test]
    fn test_workload_names() {
        let names: Vec<_> = WorkloadKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["upload", "ui", "search", "download"]);
    }
}
