//!
//! Per-application metric records, merged from the monitoring reports.
//!
//! The request volume report seeds the [`Aggregate`], one record per application ordered by
//! application id. Every other report only overwrites the fields it owns on records that
//! already exist; entries for unknown applications are dropped.
use crate::monitoring::{ApplicationEntry, Report};
use std::collections::HashMap;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Convert a byte count to megabytes
#[must_use]
pub fn bytes_to_megabytes(bytes: f64) -> f64 {
    bytes / BYTES_PER_MEGABYTE
}

/// Metrics for one application over the reporting window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRecord {
    pub org_name: String,
    pub env_name: String,
    pub app_id: String,
    pub request_volume: Option<u64>,
    pub successful_requests: Option<u64>,
    pub failed_requests: Option<u64>,
    /// Milliseconds
    pub response_time: Option<f64>,
    /// Percent
    pub cpu_utilization: Option<f64>,
    /// Percent
    pub memory_pressure: Option<f64>,
    /// Megabytes
    pub memory_utilization: Option<f64>,
    /// Megabytes
    pub total_memory: Option<f64>,
}

impl MetricRecord {
    /// Build a record from a request volume entry
    #[must_use]
    pub fn from_seed(entry: &ApplicationEntry) -> Self {
        Self {
            org_name: entry.org_name.clone().unwrap_or_default(),
            env_name: entry.env_name.clone().unwrap_or_default(),
            app_id: entry.app_id.clone(),
            request_volume: entry.request_volume,
            successful_requests: entry.successful_requests,
            failed_requests: entry.failed_requests,
            response_time: entry.response_time,
            cpu_utilization: entry.cpu_utilization,
            memory_pressure: entry.memory_pressure,
            memory_utilization: entry.memory_utilization.map(bytes_to_megabytes),
            total_memory: entry.total_memory.map(bytes_to_megabytes),
        }
    }

    /// Successful requests as a percentage of the request volume, `0%` without traffic
    #[must_use]
    pub fn success_rate(&self) -> String {
        match self.request_volume {
            Some(volume) if volume > 0 => {
                #[allow(clippy::cast_precision_loss)]
                let rate = self.successful_requests.unwrap_or(0) as f64 / volume as f64 * 100.0;
                format!("{rate:.2}%")
            }
            _ => "0%".to_string(),
        }
    }

    /// Overwrite the fields `report` owns with the values present in `entry`.
    /// Values absent from the entry keep what the record already had.
    pub fn merge(&mut self, report: Report, entry: &ApplicationEntry) {
        fn set<T>(field: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *field = value;
            }
        }

        match report {
            Report::RequestVolume => {
                set(&mut self.request_volume, entry.request_volume);
                set(&mut self.successful_requests, entry.successful_requests);
                set(&mut self.failed_requests, entry.failed_requests);
            }
            Report::Performance => set(&mut self.response_time, entry.response_time),
            Report::Failures => set(&mut self.failed_requests, entry.failed_requests),
            Report::CpuUtilization => set(&mut self.cpu_utilization, entry.cpu_utilization),
            Report::MemoryUtilization => {
                set(&mut self.memory_pressure, entry.memory_pressure);
                set(
                    &mut self.memory_utilization,
                    entry.memory_utilization.map(bytes_to_megabytes),
                );
                set(&mut self.total_memory, entry.total_memory.map(bytes_to_megabytes));
            }
        }
    }
}

fn display_value<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn display_decimal(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

impl std::fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Organization Name: {}", self.org_name)?;
        writeln!(f, "Environment Name: {}", self.env_name)?;
        writeln!(f, "Application ID: {}", self.app_id)?;
        writeln!(f, "Request Volume: {}", display_value(self.request_volume))?;
        writeln!(f, "Successful Requests: {}", display_value(self.successful_requests))?;
        writeln!(f, "Failed Requests: {}", display_value(self.failed_requests))?;
        writeln!(f, "Response Time: {} ms", display_decimal(self.response_time))?;
        writeln!(f, "CPU Utilization: {}%", display_decimal(self.cpu_utilization))?;
        writeln!(f, "Memory Pressure: {}%", display_decimal(self.memory_pressure))?;
        writeln!(f, "Memory Utilization: {} MB", display_decimal(self.memory_utilization))?;
        writeln!(f, "Total Memory: {} MB", display_decimal(self.total_memory))?;
        write!(f, "Success Rate: {}", self.success_rate())
    }
}

/// Returned when a second record with the same application id is seeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateApplication(pub String);

/// Outcome of seeding the aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedOutcome {
    pub records: usize,
    pub duplicates: usize,
}

/// Outcome of applying an enrichment report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichOutcome {
    pub applied: usize,
    pub dropped: usize,
}

/// Metric records keyed by application id, iterated in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    records: Vec<MetricRecord>,
    index: HashMap<String, usize>,
}

impl Aggregate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the aggregate from the request volume report, ordered by application id
    #[must_use]
    pub fn seed(entries: &[ApplicationEntry]) -> (Self, SeedOutcome) {
        let mut ordered: Vec<&ApplicationEntry> = entries.iter().collect();
        ordered.sort_by(|a, b| a.app_id.cmp(&b.app_id));

        let mut aggregate = Self::new();
        let mut outcome = SeedOutcome::default();
        for entry in ordered {
            match aggregate.upsert_seed(MetricRecord::from_seed(entry)) {
                Ok(()) => outcome.records += 1,
                Err(DuplicateApplication(app_id)) => {
                    tracing::warn!("duplicate application {} in request volume report", app_id);
                    outcome.duplicates += 1;
                }
            }
        }
        (aggregate, outcome)
    }

    /// Insert a new record, rejecting an application id that is already present
    pub fn upsert_seed(&mut self, record: MetricRecord) -> Result<(), DuplicateApplication> {
        if self.index.contains_key(&record.app_id) {
            return Err(DuplicateApplication(record.app_id));
        }
        self.index.insert(record.app_id.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Update the record for `app_id` if it exists. Returns whether a record was updated.
    pub fn enrich<F>(&mut self, app_id: &str, update: F) -> bool
    where
        F: FnOnce(&mut MetricRecord),
    {
        match self.index.get(app_id) {
            Some(&ix) => {
                update(&mut self.records[ix]);
                true
            }
            None => false,
        }
    }

    /// Merge every entry of an enrichment report into the matching records
    pub fn apply(&mut self, report: Report, entries: &[ApplicationEntry]) -> EnrichOutcome {
        let mut outcome = EnrichOutcome::default();
        for entry in entries {
            if self.enrich(&entry.app_id, |record| record.merge(report, entry)) {
                outcome.applied += 1;
            } else {
                outcome.dropped += 1;
            }
        }
        outcome
    }

    #[must_use]
    pub fn get(&self, app_id: &str) -> Option<&MetricRecord> {
        self.index.get(app_id).map(|&ix| &self.records[ix])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetricRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a Aggregate {
    type Item = &'a MetricRecord;
    type IntoIter = std::slice::Iter<'a, MetricRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
