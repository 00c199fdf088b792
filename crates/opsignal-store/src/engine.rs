//! Signal store implementation

use std::path::Path;

use sled::{Db, Tree};
use tracing::{debug, info};
use uuid::Uuid;

use opsignal_common::config::StorageConfig;
use opsignal_common::error::{Error, Result, StorageError, ValidationError};
use opsignal_common::filter::SignalFilter;
use opsignal_common::types::{Signal, MAX_QUERY_ROWS};

/// Tree name prefix for per-tenant signal trees
const TREE_PREFIX: &str = "signals/";

/// Key layout: 8-byte big-endian millisecond timestamp followed by a 16-byte
/// UUID. Lexicographic key order is time order; the UUID suffix keeps keys
/// unique when two records land in the same millisecond.
const KEY_LEN: usize = 24;

/// Durable tenant-scoped append-only store of signal records
pub struct SignalStore {
    db: Db,
    sync_writes: bool,
}

impl SignalStore {
    /// Open (or create) the store at the configured path
    pub fn open(config: &StorageConfig) -> Result<Self> {
        info!("Opening signal store at {}", config.path);

        let db = sled::open(Path::new(&config.path))
            .map_err(|e| Error::Storage(StorageError::OpenFailed(e.to_string())))?;

        Ok(Self {
            db,
            sync_writes: config.sync_writes,
        })
    }

    /// Append one signal. Atomic per record: the record is either fully
    /// visible to subsequent queries or absent.
    pub fn append(&self, signal: &Signal) -> Result<()> {
        if signal.agent_id.is_empty() {
            return Err(ValidationError::MissingField("agent_id").into());
        }
        if signal.customer_id.is_empty() {
            return Err(ValidationError::MissingField("customer_id").into());
        }

        let tree = self.tenant_tree(&signal.customer_id)?;
        let key = encode_key(signal.timestamp.timestamp_millis(), Uuid::new_v4());
        // JSON record encoding: the opaque metadata blob is arbitrary JSON,
        // which self-describing encodings round-trip and positional ones do not.
        let value = serde_json::to_vec(signal)
            .map_err(|e| Error::Storage(StorageError::WriteFailed(e.to_string())))?;

        tree.insert(key, value)
            .map_err(|e| Error::Storage(StorageError::WriteFailed(e.to_string())))?;

        if self.sync_writes {
            tree.flush()
                .map_err(|e| Error::Storage(StorageError::WriteFailed(e.to_string())))?;
        }

        Ok(())
    }

    /// Stream matching signals newest-first into `visit`, stopping after
    /// `limit` matches when one is given. Time-range conditions narrow the
    /// key range scanned; the remaining conditions are evaluated per record.
    /// Returns the number of matches visited.
    ///
    /// Tenant boundary: a filter carrying `customer_id` touches exactly one
    /// tenant tree. A filter without it scans every tenant tree — that mode
    /// exists for trusted internal callers only and no default tenant is
    /// ever injected; HTTP callers always arrive with the session tenant
    /// stamped into the filter.
    pub fn scan<F>(&self, filter: &SignalFilter, limit: Option<usize>, mut visit: F) -> Result<usize>
    where
        F: FnMut(Signal),
    {
        let mut visited = 0usize;

        if let Some(customer_id) = &filter.customer_id {
            let tree = self.tenant_tree(customer_id)?;
            self.scan_tree(&tree, filter, limit, &mut |s| {
                visited += 1;
                visit(s);
            })?;
        } else {
            debug!("signal scan without tenant scope, scanning all tenant trees");
            // Collect per tree, then re-establish global newest-first order.
            let mut matches: Vec<Signal> = Vec::new();
            for tree in self.tenant_trees()? {
                self.scan_tree(&tree, filter, limit, &mut |s| matches.push(s))?;
            }
            matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            if let Some(limit) = limit {
                matches.truncate(limit);
            }
            for signal in matches {
                visited += 1;
                visit(signal);
            }
        }

        opsignal_common::metrics::record_rows_scanned(visited as u64);
        Ok(visited)
    }

    /// Ordered retrieval: matching signals newest-first, hard-capped at
    /// `MAX_QUERY_ROWS` regardless of the requested limit.
    pub fn query(&self, filter: &SignalFilter, limit: usize) -> Result<Vec<Signal>> {
        let cap = limit.min(MAX_QUERY_ROWS);
        let mut rows = Vec::with_capacity(cap.min(256));
        self.scan(filter, Some(cap), |signal| rows.push(signal))?;
        Ok(rows)
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| Error::Storage(StorageError::WriteFailed(e.to_string())))?;
        Ok(())
    }

    fn scan_tree<F>(
        &self,
        tree: &Tree,
        filter: &SignalFilter,
        limit: Option<usize>,
        visit: &mut F,
    ) -> Result<()>
    where
        F: FnMut(Signal),
    {
        let lower = filter
            .from
            .map_or_else(Vec::new, |t| range_key(t.timestamp_millis(), 0x00));
        let upper = filter
            .to
            .map_or_else(|| vec![0xff; KEY_LEN], |t| range_key(t.timestamp_millis(), 0xff));

        let mut matched = 0usize;
        for entry in tree.range(lower..=upper).rev() {
            let (_, value) =
                entry.map_err(|e| Error::Storage(StorageError::ReadFailed(e.to_string())))?;
            let signal: Signal = serde_json::from_slice(&value)
                .map_err(|e| Error::Storage(StorageError::CorruptRecord(e.to_string())))?;

            if !filter.matches(&signal) {
                continue;
            }

            visit(signal);
            matched += 1;
            if limit.is_some_and(|l| matched >= l) {
                break;
            }
        }

        Ok(())
    }

    fn tenant_tree(&self, customer_id: &str) -> Result<Tree> {
        self.db
            .open_tree(format!("{TREE_PREFIX}{customer_id}"))
            .map_err(|e| Error::Storage(StorageError::OpenFailed(e.to_string())))
    }

    fn tenant_trees(&self) -> Result<Vec<Tree>> {
        let mut trees = Vec::new();
        for name in self.db.tree_names() {
            if name.starts_with(TREE_PREFIX.as_bytes()) {
                let tree = self
                    .db
                    .open_tree(&name)
                    .map_err(|e| Error::Storage(StorageError::OpenFailed(e.to_string())))?;
                trees.push(tree);
            }
        }
        Ok(trees)
    }
}

fn encode_key(timestamp_millis: i64, id: Uuid) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    // Telemetry timestamps are post-epoch; clamp keeps key order total anyway.
    let millis = u64::try_from(timestamp_millis).unwrap_or(0);
    key[..8].copy_from_slice(&millis.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

fn range_key(timestamp_millis: i64, fill: u8) -> Vec<u8> {
    let millis = u64::try_from(timestamp_millis).unwrap_or(0);
    let mut key = vec![fill; KEY_LEN];
    key[..8].copy_from_slice(&millis.to_be_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use opsignal_common::filter::FilterParams;
    use tempfile::TempDir;

    fn test_store() -> (SignalStore, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let config = StorageConfig {
            path: dir.path().join("data").to_string_lossy().to_string(),
            sync_writes: false,
        };
        (SignalStore::open(&config).expect("open store"), dir)
    }

    fn signal(customer: &str, agent: &str, ts: DateTime<Utc>, status: i32) -> Signal {
        Signal {
            agent_id: agent.to_string(),
            customer_id: customer.to_string(),
            timestamp: ts,
            protocol: "http".to_string(),
            operation: "GET /orders".to_string(),
            status,
            latency_ms: 10.0,
            metadata: serde_json::Value::Null,
            alerts: vec![],
            cpu_usage: 0.5,
            mem_usage: 0.4,
            gpu_usage: 0.0,
            db: None,
        }
    }

    #[test]
    fn test_append_and_query_newest_first() {
        let (store, _dir) = test_store();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        for i in 0..5 {
            store
                .append(&signal("c1", "a1", base + chrono::Duration::minutes(i), 200))
                .unwrap();
        }

        let rows = store
            .query(&SignalFilter::for_tenant("c1"), MAX_QUERY_ROWS)
            .unwrap();
        assert_eq!(rows.len(), 5);
        for pair in rows.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[test]
    fn test_tenant_isolation() {
        let (store, _dir) = test_store();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        store.append(&signal("tenant-a", "a1", ts, 200)).unwrap();
        store.append(&signal("tenant-b", "b1", ts, 200)).unwrap();

        let rows = store
            .query(&SignalFilter::for_tenant("tenant-a"), MAX_QUERY_ROWS)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows.iter().all(|s| s.customer_id == "tenant-a"));
    }

    #[test]
    fn test_row_cap_enforced() {
        let (store, _dir) = test_store();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        for i in 0..1500 {
            store
                .append(&signal("c1", "a1", base + chrono::Duration::seconds(i), 200))
                .unwrap();
        }

        // Caller asking for more than the cap still gets at most the cap.
        let rows = store.query(&SignalFilter::for_tenant("c1"), 5000).unwrap();
        assert_eq!(rows.len(), MAX_QUERY_ROWS);
        // Newest record first.
        assert_eq!(rows[0].timestamp, base + chrono::Duration::seconds(1499));
    }

    #[test]
    fn test_time_range_narrows_scan() {
        let (store, _dir) = test_store();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        for i in 0..10 {
            store
                .append(&signal("c1", "a1", base + chrono::Duration::hours(i), 200))
                .unwrap();
        }

        let filter = FilterParams {
            customer_id: Some("c1".into()),
            from: Some("2024-05-01T12:00:00Z".into()),
            to: Some("2024-05-01T14:00:00Z".into()),
            ..FilterParams::default()
        }
        .build()
        .unwrap();

        let rows = store.query(&filter, MAX_QUERY_ROWS).unwrap();
        assert_eq!(rows.len(), 3); // 12:00, 13:00, 14:00 inclusive
    }

    #[test]
    fn test_append_rejects_missing_identity() {
        let (store, _dir) = test_store();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        let no_agent = signal("c1", "", ts, 200);
        assert!(store.append(&no_agent).is_err());

        let no_customer = signal("", "a1", ts, 200);
        assert!(store.append(&no_customer).is_err());
    }

    #[test]
    fn test_corrupt_record_fails_query() {
        let (store, _dir) = test_store();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        store.append(&signal("c1", "a1", ts, 200)).unwrap();

        // Plant an undecodable value directly in the tenant tree. The query
        // must error rather than silently return a partial result.
        let tree = store.tenant_tree("c1").unwrap();
        let key = encode_key(ts.timestamp_millis() + 1, Uuid::new_v4());
        tree.insert(&key[..], &b"not a signal"[..]).unwrap();

        let err = store
            .query(&SignalFilter::for_tenant("c1"), MAX_QUERY_ROWS)
            .unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::CorruptRecord(_))));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_scan_without_tenant_scope_spans_tenants() {
        let (store, _dir) = test_store();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        store.append(&signal("tenant-a", "a1", ts, 200)).unwrap();
        store
            .append(&signal("tenant-b", "b1", ts + chrono::Duration::minutes(1), 200))
            .unwrap();

        let rows = store.query(&SignalFilter::default(), MAX_QUERY_ROWS).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].customer_id, "tenant-b"); // newest first across trees
    }
}
