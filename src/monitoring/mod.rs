//!
//! Monitoring report endpoints
//!
use crate::{Client, Result};

pub mod types;

pub use types::{ApplicationData, ApplicationEntry};

/// The five monitoring reports, in the order a run fetches them
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Report {
    /// Request volume, the seeding report
    RequestVolume,
    /// Average response time
    Performance,
    /// Failed requests
    Failures,
    /// CPU utilization
    CpuUtilization,
    /// Memory pressure, utilization and total
    MemoryUtilization,
}

impl Report {
    /// All reports in fetch order
    pub const ALL: [Self; 5] = [
        Self::RequestVolume,
        Self::Performance,
        Self::Failures,
        Self::CpuUtilization,
        Self::MemoryUtilization,
    ];

    /// Path segment naming the report in the monitoring API
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::RequestVolume => "requests",
            Self::Performance => "performance",
            Self::Failures => "failures",
            Self::CpuUtilization => "cpu-utilization",
            Self::MemoryUtilization => "memory-utilization",
        }
    }

    /// The request volume report creates records, every other report enriches them
    #[must_use]
    pub const fn is_seed(self) -> bool {
        matches!(self, Self::RequestVolume)
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Path of a report for an organization and environment over `time_window`, relative to the
/// API base URL
#[must_use]
pub fn report_path(
    organization_id: &str,
    environment_id: &str,
    report: Report,
    time_window: &str,
) -> String {
    format!(
        "monitoring/api/organizations/{organization_id}/environments/{environment_id}/reports/{}/{time_window}",
        report.path_segment()
    )
}

/// Fetch one report and return its per-application entries
#[tracing::instrument(skip(client))]
pub async fn fetch_report(
    client: &Client,
    organization_id: &str,
    environment_id: &str,
    report: Report,
    time_window: &str,
) -> Result<Vec<ApplicationEntry>> {
    let path = report_path(organization_id, environment_id, report, time_window);
    let data: ApplicationData = client.get_json(&path).await?;
    tracing::debug!("{} entries in {} report", data.application_data.len(), report);
    Ok(data.application_data)
}
