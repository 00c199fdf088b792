//! Ingestion pipeline implementation

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use opsignal_common::error::Result;
use opsignal_common::types::{AgentIdentity, Signal, SignalPayload};
use opsignal_store::SignalStore;

/// Destination for accepted signals. The production impl is `SignalStore`;
/// tests substitute faulting sinks to exercise partial-failure behavior.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn store(&self, signal: &Signal) -> Result<()>;
}

#[async_trait]
impl SignalSink for SignalStore {
    async fn store(&self, signal: &Signal) -> Result<()> {
        self.append(signal)
    }
}

/// Validates and persists a batch of incoming signals under an authenticated
/// agent/customer identity, isolating per-record failures
pub struct IngestPipeline {
    sink: Arc<dyn SignalSink>,
}

impl IngestPipeline {
    pub fn new(sink: Arc<dyn SignalSink>) -> Self {
        Self { sink }
    }

    /// Ingest one batch. Every record is stamped with the authenticated
    /// identity (payload-supplied identity never reaches this point) and a
    /// timestamp if the payload carried none. Records are persisted
    /// independently; failures are logged and skipped. Returns the number
    /// of records accepted.
    pub async fn ingest(&self, identity: &AgentIdentity, batch: Vec<SignalPayload>) -> u64 {
        let total = batch.len();
        let mut accepted = 0u64;

        for payload in batch {
            if let Err(e) = payload.validate() {
                warn!(
                    agent_id = %identity.agent_id,
                    customer_id = %identity.customer_id,
                    error = %e,
                    "dropping invalid signal record"
                );
                continue;
            }

            let signal = stamp(identity, payload);
            match self.sink.store(&signal).await {
                Ok(()) => accepted += 1,
                Err(e) => {
                    warn!(
                        agent_id = %identity.agent_id,
                        customer_id = %identity.customer_id,
                        error = %e,
                        "failed to persist signal record"
                    );
                }
            }
        }

        let failed = total as u64 - accepted;
        opsignal_common::metrics::record_ingest_batch(accepted, failed);
        debug!(
            agent_id = %identity.agent_id,
            accepted,
            failed,
            "ingested signal batch"
        );

        accepted
    }
}

/// Build the stored record: authenticated identity wins over anything the
/// payload claimed, missing timestamps get the ingestion boundary's clock.
fn stamp(identity: &AgentIdentity, payload: SignalPayload) -> Signal {
    Signal {
        agent_id: identity.agent_id.clone(),
        customer_id: identity.customer_id.clone(),
        timestamp: payload.timestamp.unwrap_or_else(Utc::now),
        protocol: payload.protocol,
        operation: payload.operation,
        status: payload.status,
        latency_ms: payload.latency_ms,
        metadata: payload.metadata,
        alerts: payload.alerts,
        cpu_usage: payload.cpu_usage,
        mem_usage: payload.mem_usage,
        gpu_usage: payload.gpu_usage,
        db: payload.db,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsignal_common::error::{Error, StorageError};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSink {
        stored: Mutex<Vec<Signal>>,
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl RecordingSink {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                stored: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl SignalSink for RecordingSink {
        async fn store(&self, signal: &Signal) -> Result<()> {
            let mut stored = self.stored.lock();
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(call) {
                return Err(Error::Storage(StorageError::WriteFailed(
                    "injected fault".to_string(),
                )));
            }
            stored.push(signal.clone());
            Ok(())
        }
    }

    fn identity() -> AgentIdentity {
        AgentIdentity {
            agent_id: "agent-1".to_string(),
            customer_id: "customer-1".to_string(),
        }
    }

    fn payload(status: i32) -> SignalPayload {
        serde_json::from_value(serde_json::json!({
            "protocol": "http",
            "operation": "GET /orders",
            "status": status,
            "latency_ms": 4.2,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_identity_stamping_overrides_payload() {
        let sink = Arc::new(RecordingSink::new(None));
        let pipeline = IngestPipeline::new(sink.clone());

        // Payload claims a different identity; the keys are dropped at
        // deserialization and the authenticated identity is stamped in.
        let forged: SignalPayload = serde_json::from_value(serde_json::json!({
            "agent_id": "forged-agent",
            "customer_id": "forged-customer",
            "status": 200,
        }))
        .unwrap();

        let accepted = pipeline.ingest(&identity(), vec![forged]).await;
        assert_eq!(accepted, 1);

        let stored = sink.stored.lock();
        assert_eq!(stored[0].agent_id, "agent-1");
        assert_eq!(stored[0].customer_id, "customer-1");
    }

    #[tokio::test]
    async fn test_missing_timestamp_stamped() {
        let sink = Arc::new(RecordingSink::new(None));
        let pipeline = IngestPipeline::new(sink.clone());

        let before = Utc::now();
        pipeline.ingest(&identity(), vec![payload(200)]).await;
        let after = Utc::now();

        let stored = sink.stored.lock();
        assert!(stored[0].timestamp >= before && stored[0].timestamp <= after);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort_batch() {
        // Second record faults; the other four must still land.
        let sink = Arc::new(RecordingSink::new(Some(1)));
        let pipeline = IngestPipeline::new(sink.clone());

        let batch = (0..5).map(|_| payload(200)).collect();
        let accepted = pipeline.ingest(&identity(), batch).await;

        assert_eq!(accepted, 4);
        assert_eq!(sink.stored.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_record_skipped_not_fatal() {
        let sink = Arc::new(RecordingSink::new(None));
        let pipeline = IngestPipeline::new(sink.clone());

        let bad: SignalPayload =
            serde_json::from_value(serde_json::json!({"status": 200, "latency_ms": -3.0}))
                .unwrap();
        let accepted = pipeline.ingest(&identity(), vec![bad, payload(200)]).await;

        assert_eq!(accepted, 1);
        assert_eq!(sink.stored.lock().len(), 1);
    }
}
