//! Filter Builder
//!
//! Translates the open set of optional dashboard query parameters into a
//! structured, injection-safe predicate over the signal relation. Values are
//! carried as typed conditions and bound at evaluation time; nothing is ever
//! interpolated into query text. The same `SignalFilter` drives plain
//! retrieval and both aggregation shapes, so filter semantics cannot drift
//! between code paths.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Result, ValidationError};
use crate::types::Signal;

/// Raw, unvalidated filter fields as they arrive on the query string.
/// Transient and request-scoped; never persisted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    pub agent_id: Option<String>,
    pub customer_id: Option<String>,
    pub protocol: Option<String>,
    pub operation: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl FilterParams {
    /// Validate and build the typed predicate. Absent or empty-string fields
    /// impose no constraint; unparseable time bounds fail here, before any
    /// store access.
    pub fn build(&self) -> Result<SignalFilter> {
        Ok(SignalFilter {
            agent_id: non_empty(&self.agent_id),
            customer_id: non_empty(&self.customer_id),
            protocol: non_empty(&self.protocol),
            operation: non_empty(&self.operation),
            from: parse_bound("from", &self.from)?,
            to: parse_bound("to", &self.to)?,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

fn parse_bound(field: &'static str, value: &Option<String>) -> Result<Option<DateTime<Utc>>> {
    match value.as_deref().filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| {
                ValidationError::InvalidTime {
                    field,
                    value: raw.to_string(),
                }
                .into()
            }),
    }
}

/// A single bound condition. The logical predicate is the AND of all
/// conditions a filter carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    AgentId(String),
    CustomerId(String),
    Protocol(String),
    Operation(String),
    /// timestamp >= bound (inclusive)
    After(DateTime<Utc>),
    /// timestamp <= bound (inclusive)
    Until(DateTime<Utc>),
}

/// Validated predicate over the signal relation
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub agent_id: Option<String>,
    pub customer_id: Option<String>,
    pub protocol: Option<String>,
    pub operation: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl SignalFilter {
    /// Filter constraining only the tenant dimension
    #[must_use]
    pub fn for_tenant(customer_id: &str) -> Self {
        Self {
            customer_id: Some(customer_id.to_string()),
            ..Self::default()
        }
    }

    /// Pin the tenant dimension to the authenticated session's company,
    /// discarding whatever the caller may have supplied.
    #[must_use]
    pub fn scoped_to(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }

    /// The ordered list of bound conditions this predicate carries
    #[must_use]
    pub fn conditions(&self) -> Vec<Condition> {
        let mut conditions = Vec::new();
        if let Some(v) = &self.agent_id {
            conditions.push(Condition::AgentId(v.clone()));
        }
        if let Some(v) = &self.customer_id {
            conditions.push(Condition::CustomerId(v.clone()));
        }
        if let Some(v) = &self.protocol {
            conditions.push(Condition::Protocol(v.clone()));
        }
        if let Some(v) = &self.operation {
            conditions.push(Condition::Operation(v.clone()));
        }
        if let Some(v) = self.from {
            conditions.push(Condition::After(v));
        }
        if let Some(v) = self.to {
            conditions.push(Condition::Until(v));
        }
        conditions
    }

    /// Evaluate the predicate against one signal
    #[must_use]
    pub fn matches(&self, signal: &Signal) -> bool {
        self.conditions().iter().all(|c| match c {
            Condition::AgentId(v) => signal.agent_id == *v,
            Condition::CustomerId(v) => signal.customer_id == *v,
            Condition::Protocol(v) => signal.protocol == *v,
            Condition::Operation(v) => signal.operation == *v,
            Condition::After(v) => signal.timestamp >= *v,
            Condition::Until(v) => signal.timestamp <= *v,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn signal(agent: &str, customer: &str, protocol: &str, ts: &str) -> Signal {
        Signal {
            agent_id: agent.to_string(),
            customer_id: customer.to_string(),
            timestamp: DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            protocol: protocol.to_string(),
            operation: "GET /orders".to_string(),
            status: 200,
            latency_ms: 5.0,
            metadata: Value::Null,
            alerts: vec![],
            cpu_usage: 0.1,
            mem_usage: 0.2,
            gpu_usage: 0.0,
            db: None,
        }
    }

    #[test]
    fn test_empty_params_impose_no_constraint() {
        let filter = FilterParams {
            agent_id: Some(String::new()),
            protocol: Some(String::new()),
            ..FilterParams::default()
        }
        .build()
        .unwrap();

        assert!(filter.conditions().is_empty());
        assert!(filter.matches(&signal("a1", "c1", "http", "2024-05-01T10:05:00Z")));
    }

    #[test]
    fn test_conditions_are_anded() {
        let filter = FilterParams {
            agent_id: Some("a1".into()),
            protocol: Some("grpc".into()),
            ..FilterParams::default()
        }
        .build()
        .unwrap();

        assert!(filter.matches(&signal("a1", "c1", "grpc", "2024-05-01T10:05:00Z")));
        assert!(!filter.matches(&signal("a1", "c1", "http", "2024-05-01T10:05:00Z")));
        assert!(!filter.matches(&signal("a2", "c1", "grpc", "2024-05-01T10:05:00Z")));
    }

    #[test]
    fn test_time_range_inclusive() {
        let filter = FilterParams {
            from: Some("2024-05-01T10:00:00Z".into()),
            to: Some("2024-05-01T11:00:00Z".into()),
            ..FilterParams::default()
        }
        .build()
        .unwrap();

        assert!(filter.matches(&signal("a", "c", "http", "2024-05-01T10:00:00Z")));
        assert!(filter.matches(&signal("a", "c", "http", "2024-05-01T11:00:00Z")));
        assert!(!filter.matches(&signal("a", "c", "http", "2024-05-01T11:00:01Z")));
        assert!(!filter.matches(&signal("a", "c", "http", "2024-05-01T09:59:59Z")));
    }

    #[test]
    fn test_unparseable_time_rejected() {
        let err = FilterParams {
            from: Some("yesterday".into()),
            ..FilterParams::default()
        }
        .build()
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_scoped_to_overrides_customer() {
        let filter = FilterParams {
            customer_id: Some("forged-tenant".into()),
            ..FilterParams::default()
        }
        .build()
        .unwrap()
        .scoped_to("real-tenant");

        assert_eq!(filter.customer_id.as_deref(), Some("real-tenant"));
    }

    #[test]
    fn test_condition_order_is_stable() {
        let filter = FilterParams {
            agent_id: Some("a1".into()),
            customer_id: Some("c1".into()),
            from: Some("2024-05-01T00:00:00Z".into()),
            ..FilterParams::default()
        }
        .build()
        .unwrap();

        let conditions = filter.conditions();
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions[0], Condition::AgentId("a1".into()));
        assert_eq!(conditions[1], Condition::CustomerId("c1".into()));
        assert!(matches!(conditions[2], Condition::After(_)));
    }
}
