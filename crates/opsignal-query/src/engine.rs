//! Query engine implementation

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;

use opsignal_common::config::QueryConfig;
use opsignal_common::error::{Error, QueryError, Result};
use opsignal_common::filter::SignalFilter;
use opsignal_common::types::{
    Signal, SignalGroup, TimeBucket, Granularity, MAX_QUERY_ROWS, MAX_SUMMARY_GROUPS,
    MAX_TIMESERIES_BUCKETS,
};
use opsignal_store::SignalStore;

/// Read seam over the signal store. The production impl is `SignalStore`;
/// tests substitute slow or failing sources to exercise the deadline and
/// persistence-failure paths.
pub trait SignalSource: Send + Sync {
    /// Stream matching signals newest-first into `visit`
    fn scan(
        &self,
        filter: &SignalFilter,
        limit: Option<usize>,
        visit: &mut dyn FnMut(Signal),
    ) -> Result<usize>;

    /// Ordered retrieval, newest-first, capped at `limit`
    fn query(&self, filter: &SignalFilter, limit: usize) -> Result<Vec<Signal>>;
}

impl SignalSource for SignalStore {
    fn scan(
        &self,
        filter: &SignalFilter,
        limit: Option<usize>,
        visit: &mut dyn FnMut(Signal),
    ) -> Result<usize> {
        SignalStore::scan(self, filter, limit, |signal| visit(signal))
    }

    fn query(&self, filter: &SignalFilter, limit: usize) -> Result<Vec<Signal>> {
        SignalStore::query(self, filter, limit)
    }
}

/// Main query engine. Holds the process-wide store handle; each call is
/// request-scoped and runs under the configured deadline.
pub struct QueryEngine {
    config: QueryConfig,
    source: Arc<dyn SignalSource>,
}

impl QueryEngine {
    pub fn new(config: &QueryConfig, source: Arc<dyn SignalSource>) -> Self {
        Self {
            config: config.clone(),
            source,
        }
    }

    /// Ordered retrieval: matching signals newest-first, capped at 1000 rows
    pub async fn query(&self, filter: SignalFilter) -> Result<Vec<Signal>> {
        debug!(?filter, "executing signal query");
        self.run("signals", move |source| source.query(&filter, MAX_QUERY_ROWS))
            .await
    }

    /// Grouped summary: signals grouped by (agent, protocol, operation) with
    /// count, average latency and error rate per group. Ordered by count
    /// descending, capped at 100 groups.
    pub async fn summary(&self, filter: SignalFilter) -> Result<Vec<SignalGroup>> {
        debug!(?filter, "executing summary query");
        self.run("summary", move |source| {
            let mut groups: HashMap<(String, String, String), GroupAccumulator> = HashMap::new();

            source.scan(&filter, None, &mut |signal| {
                let key = (
                    signal.agent_id.clone(),
                    signal.protocol.clone(),
                    signal.operation.clone(),
                );
                groups.entry(key).or_default().add(&signal);
            })?;

            let mut rows: Vec<SignalGroup> = groups
                .into_iter()
                .map(|((agent_id, protocol, operation), acc)| acc.finish(agent_id, protocol, operation))
                .collect();

            // Count descending; key ascending keeps ties deterministic.
            rows.sort_by(|a, b| {
                b.count.cmp(&a.count).then_with(|| {
                    (&a.agent_id, &a.protocol, &a.operation)
                        .cmp(&(&b.agent_id, &b.protocol, &b.operation))
                })
            });
            rows.truncate(MAX_SUMMARY_GROUPS);
            Ok(rows)
        })
        .await
    }

    /// Time-bucketed counts: signals bucketed to hour or day boundaries.
    /// Ordered ascending by bucket start, capped at 1000 buckets.
    pub async fn timeseries(
        &self,
        filter: SignalFilter,
        granularity: Granularity,
    ) -> Result<Vec<TimeBucket>> {
        debug!(?filter, ?granularity, "executing timeseries query");
        self.run("timeseries", move |source| {
            let bucket_ms = granularity.bucket_ms();
            let mut buckets: BTreeMap<i64, u64> = BTreeMap::new();

            source.scan(&filter, None, &mut |signal| {
                let millis = signal.timestamp.timestamp_millis();
                let bucket = (millis / bucket_ms) * bucket_ms;
                *buckets.entry(bucket).or_default() += 1;
            })?;

            let mut rows: Vec<TimeBucket> = buckets
                .into_iter()
                .filter_map(|(millis, count)| {
                    DateTime::<Utc>::from_timestamp_millis(millis)
                        .map(|bucket_start| TimeBucket { bucket_start, count })
                })
                .collect();
            rows.truncate(MAX_TIMESERIES_BUCKETS);
            Ok(rows)
        })
        .await
    }

    /// Run a store-bound closure on the blocking pool under the configured
    /// deadline. On timeout the scan is abandoned and the caller gets
    /// `QueryError::Timeout`; reads are snapshot-only so nothing is left
    /// half-applied.
    async fn run<T, F>(&self, kind: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn SignalSource>) -> Result<T> + Send + 'static,
    {
        let started = Instant::now();
        let source = Arc::clone(&self.source);
        let deadline = Duration::from_millis(self.config.max_execution_time_ms);

        let result = match tokio::time::timeout(deadline, tokio::task::spawn_blocking(move || f(source)))
            .await
        {
            Err(_) => Err(Error::Query(QueryError::Timeout(
                self.config.max_execution_time_ms,
            ))),
            Ok(Err(join)) => Err(Error::Query(QueryError::ExecutionError(join.to_string()))),
            Ok(Ok(result)) => result,
        };

        opsignal_common::metrics::record_query(kind, result.is_ok());
        opsignal_common::metrics::record_query_latency(
            kind,
            started.elapsed().as_secs_f64() * 1000.0,
        );
        result
    }
}

#[derive(Default)]
struct GroupAccumulator {
    count: u64,
    latency_sum: f64,
    errors: u64,
}

impl GroupAccumulator {
    fn add(&mut self, signal: &Signal) {
        self.count += 1;
        self.latency_sum += signal.latency_ms;
        if signal.is_error() {
            self.errors += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self, agent_id: String, protocol: String, operation: String) -> SignalGroup {
        // A group exists only because at least one signal landed in it.
        SignalGroup {
            agent_id,
            protocol,
            operation,
            count: self.count,
            avg_latency_ms: self.latency_sum / self.count as f64,
            error_rate: self.errors as f64 / self.count as f64,
        }
    }
}
