//!
//! Report rendering. Everything here is a pure function of the [`Aggregate`], file and mail
//! delivery live in [`crate::dispatch`].
//!
use crate::aggregate::{Aggregate, MetricRecord};

pub mod html;
pub mod spreadsheet;

/// One cell of the report table
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Integer(u64),
    /// Rendered with two decimals
    Decimal(f64),
    Empty,
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(n) => write!(f, "{n:.2}"),
            Self::Empty => Ok(()),
        }
    }
}

impl From<Option<u64>> for Cell {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::Empty, Self::Integer)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Empty, Self::Decimal)
    }
}

/// Spreadsheet headers, in record attribute order
pub const COLUMNS: [&str; 11] = [
    "Organization Name",
    "Environment Name",
    "Application ID",
    "Request Volume",
    "Successful Requests",
    "Failed Requests",
    "Response Time",
    "CPU Utilization",
    "Memory Pressure",
    "Memory Utilization",
    "Total Memory",
];

/// The eleven data cells of a record, in [`COLUMNS`] order
#[must_use]
pub fn record_cells(record: &MetricRecord) -> [Cell; 11] {
    [
        Cell::Text(record.org_name.clone()),
        Cell::Text(record.env_name.clone()),
        Cell::Text(record.app_id.clone()),
        record.request_volume.into(),
        record.successful_requests.into(),
        record.failed_requests.into(),
        record.response_time.into(),
        record.cpu_utilization.into(),
        record.memory_pressure.into(),
        record.memory_utilization.into(),
        record.total_memory.into(),
    ]
}

/// Data rows of the aggregate, one per record in aggregate order
#[must_use]
pub fn rows(aggregate: &Aggregate) -> Vec<[Cell; 11]> {
    aggregate.iter().map(record_cells).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::monitoring::{ApplicationEntry, Report};

    #[test]
    fn cells_follow_column_order() {
        let (mut aggregate, _) = Aggregate::seed(&[ApplicationEntry {
            app_id: "a1".into(),
            org_name: Some("Org".into()),
            env_name: Some("Prod".into()),
            request_volume: Some(100),
            successful_requests: Some(90),
            failed_requests: Some(5),
            ..Default::default()
        }]);
        aggregate.apply(
            Report::MemoryUtilization,
            &[ApplicationEntry {
                app_id: "a1".into(),
                memory_utilization: Some(2_097_152.0),
                ..Default::default()
            }],
        );

        let rows = rows(&aggregate);
        let text: Vec<String> = rows[0].iter().map(ToString::to_string).collect();
        assert_eq!(
            text,
            vec!["Org", "Prod", "a1", "100", "90", "5", "", "", "", "2.00", ""]
        );
    }
}
