//! Configuration loading

use anyhow::Result;
use std::path::Path;

use opsignal_common::config::Config;

/// Load configuration from file, falling back to defaults when absent
pub async fn load(path: &str) -> Result<Config> {
    let path = Path::new(path);

    if path.exists() {
        Config::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        tracing::warn!("config file {} not found, using defaults", path.display());
        Ok(Config::default())
    }
}
