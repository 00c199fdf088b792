//! Server orchestration

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use opsignal_api::RestServer;
use opsignal_common::config::Config;
use opsignal_ingest::IngestPipeline;
use opsignal_query::QueryEngine;
use opsignal_security::SecurityManager;
use opsignal_store::SignalStore;

/// Main OpSignal server orchestrating all components
pub struct OpSignalServer {
    store: Arc<SignalStore>,
    rest_server: Arc<RestServer>,
}

impl OpSignalServer {
    pub fn new(config: &Config) -> Result<Self> {
        info!("Initializing OpSignal components...");

        // Recorder must be in place before anything records.
        opsignal_common::metrics::init();

        // Security first: nothing is served without an authentication seam
        let security = Arc::new(SecurityManager::new(&config.security)?);

        // The store is the single process-wide durable handle, shared
        // read-only by every request-scoped operation.
        let store = Arc::new(SignalStore::open(&config.storage)?);

        let pipeline = Arc::new(IngestPipeline::new(store.clone()));
        let query = Arc::new(QueryEngine::new(&config.query, store.clone()));

        let rest_server = Arc::new(RestServer::new(
            &config.server,
            pipeline,
            query,
            security,
        ));

        info!("OpSignal initialization complete");

        Ok(Self { store, rest_server })
    }

    /// Run the REST server until it stops
    pub async fn run(&self) -> Result<()> {
        // actix-web has its own runtime; give it a dedicated thread
        let rest_server = self.rest_server.clone();
        let rest_thread = std::thread::spawn(move || {
            let rt = actix_rt::Runtime::new().expect("Failed to create actix runtime");
            rt.block_on(async move {
                if let Err(e) = rest_server.run().await {
                    error!("REST server error: {}", e);
                }
            });
        });

        tokio::task::spawn_blocking(move || rest_thread.join())
            .await?
            .map_err(|_| anyhow::anyhow!("REST server thread panicked"))?;

        Ok(())
    }

    /// Graceful shutdown: stop serving, then flush pending writes
    pub fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");
        self.rest_server.shutdown();
        self.store.flush()?;
        info!("Shutdown complete");
        Ok(())
    }
}
