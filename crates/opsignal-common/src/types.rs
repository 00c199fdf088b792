//! Core type definitions for OpSignal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Hard cap on rows returned by a plain signal query
pub const MAX_QUERY_ROWS: usize = 1000;

/// Hard cap on groups returned by a summary query
pub const MAX_SUMMARY_GROUPS: usize = 100;

/// Hard cap on buckets returned by a timeseries query
pub const MAX_TIMESERIES_BUCKETS: usize = 1000;

/// HTTP-style status codes at or above this value denote an error signal
pub const ERROR_STATUS_THRESHOLD: i32 = 400;

/// Downstream database call captured alongside a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbCall {
    pub operation: String,
    pub table: String,
    pub latency_ms: f64,
}

/// One stored telemetry signal. Immutable once persisted; identity fields
/// are stamped from the authenticated agent, never from the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub agent_id: String,
    pub customer_id: String,
    pub timestamp: DateTime<Utc>,
    pub protocol: String,
    pub operation: String,
    pub status: i32,
    pub latency_ms: f64,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub mem_usage: f64,
    #[serde(default)]
    pub gpu_usage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<DbCall>,
}

impl Signal {
    /// Whether this signal represents a failed request
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status >= ERROR_STATUS_THRESHOLD
    }
}

/// Wire shape of one batch element on `POST /signals`. Carries no identity
/// fields: `agent_id`/`customer_id` keys in the JSON are ignored outright.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalPayload {
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub mem_usage: f64,
    #[serde(default)]
    pub gpu_usage: f64,
    #[serde(default)]
    pub db: Option<DbCall>,
}

impl SignalPayload {
    /// Validate payload invariants: non-negative measurements, no empty
    /// alert tags. Identity and timestamp are handled by the pipeline.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("latency_ms", self.latency_ms),
            ("cpu_usage", self.cpu_usage),
            ("mem_usage", self.mem_usage),
            ("gpu_usage", self.gpu_usage),
            ("db.latency_ms", self.db.as_ref().map_or(0.0, |d| d.latency_ms)),
        ] {
            if value < 0.0 {
                return Err(ValidationError::NegativeValue { field, value }.into());
            }
        }
        if self.alerts.iter().any(String::is_empty) {
            return Err(ValidationError::EmptyAlert.into());
        }
        Ok(())
    }
}

/// Identity resolved for an ingesting agent by API-key authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub customer_id: String,
}

/// Identity resolved for a dashboard caller by session-token authentication.
/// `company_id` is the tenant id used for all read-path scoping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: String,
    pub company_id: String,
    pub role: String,
}

/// Time-bucket granularity for timeseries queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    /// Parse the `bucket` query parameter. Absent means hour; anything other
    /// than "hour"/"day" is rejected, never silently defaulted.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("hour") => Ok(Granularity::Hour),
            Some("day") => Ok(Granularity::Day),
            Some(other) => Err(ValidationError::InvalidBucket(other.to_string()).into()),
        }
    }

    /// Bucket width in milliseconds
    #[must_use]
    pub fn bucket_ms(self) -> i64 {
        match self {
            Granularity::Hour => 3_600_000,
            Granularity::Day => 86_400_000,
        }
    }
}

/// One row of a summary query: signals grouped by (agent, protocol, operation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalGroup {
    pub agent_id: String,
    pub protocol: String,
    pub operation: String,
    pub count: u64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
}

/// One bucket of a timeseries query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub bucket_start: DateTime<Utc>,
    pub count: u64,
}
