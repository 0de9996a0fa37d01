//!
//! Types returned from the monitoring report endpoints.
//!
//! Every report shares the same entry shape and only fills in the fields it owns.
use serde::{Deserialize, Deserializer};

/// Body of a report response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationData {
    #[serde(default)]
    pub application_data: Vec<ApplicationEntry>,
}

/// One application in a report
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEntry {
    pub app_id: String,
    pub org_name: Option<String>,
    pub env_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub request_volume: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub successful_requests: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub failed_requests: Option<u64>,
    /// Milliseconds
    #[serde(default, deserialize_with = "lenient_f64")]
    pub response_time: Option<f64>,
    /// Percent
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cpu_utilization: Option<f64>,
    /// Percent
    #[serde(default, deserialize_with = "lenient_f64")]
    pub memory_pressure: Option<f64>,
    /// Bytes
    #[serde(default, deserialize_with = "lenient_f64")]
    pub memory_utilization: Option<f64>,
    /// Bytes
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_memory: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Number(T),
    Text(String),
}

// Numbers are sometimes sent as strings
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match Option::<Lenient<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lenient::Number(n)) => Ok(Some(n)),
        Some(Lenient::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Lenient::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid number {s:?}: {e}"))),
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    lenient(deserializer)
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match lenient::<D, f64>(deserializer)? {
        Some(n) if !n.is_finite() => Err(serde::de::Error::custom(format!(
            "invalid number {n}: not finite"
        ))),
        n => Ok(n),
    }
}
