//! Configuration management for OpSignal

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main configuration structure for OpSignal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// REST server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Query engine configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Security configuration
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Config {
    /// Load configuration from a TOML or JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = if path.as_ref().extension().map_or(false, |ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))?
        };

        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 4,
            cors_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to storage directory
    pub path: String,
    /// Flush to disk after every append
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "/var/lib/opsignal/data".to_string(),
            sync_writes: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum query execution time in milliseconds
    pub max_execution_time_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_execution_time_ms: 30000,
        }
    }
}

/// One provisioned agent credential. Key material is stored as a SHA-256
/// digest; the plaintext key lives only with the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    /// Hex-encoded SHA-256 of the API key
    pub key_sha256: String,
    pub agent_id: String,
    pub customer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// JWT secret key for dashboard session tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// JWT token expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,
    /// Provisioned agent API keys
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

fn default_jwt_secret() -> String {
    std::env::var("OPSIGNAL_JWT_SECRET").unwrap_or_else(|_| {
        // Generate a random secret if not provided (development only)
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};
        let s = RandomState::new();
        let mut hasher = s.build_hasher();
        hasher.write_u64(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64,
        );
        format!("dev-secret-{:x}", hasher.finish())
    })
}

fn default_jwt_expiration() -> u64 {
    86400 // 24 hours
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_expiration_secs: default_jwt_expiration(),
            api_keys: vec![],
        }
    }
}
