//! Security manager implementation

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use opsignal_common::config::SecurityConfig;
use opsignal_common::error::{AuthError, Error, Result};
use opsignal_common::types::{AgentIdentity, SessionIdentity};

use crate::jwt::SessionTokenCodec;

/// Main security manager: API-key resolution for agents, JWT validation for
/// dashboard sessions.
pub struct SecurityManager {
    api_keys: DashMap<String, AgentIdentity>,
    tokens: SessionTokenCodec,
}

impl SecurityManager {
    /// Build the manager from configuration
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        info!("Initializing security manager");

        if config.jwt_secret.starts_with("dev-secret-") {
            warn!(
                "Using auto-generated JWT secret. Set OPSIGNAL_JWT_SECRET environment variable for production!"
            );
        }

        let api_keys = DashMap::new();
        for entry in &config.api_keys {
            api_keys.insert(
                entry.key_sha256.to_lowercase(),
                AgentIdentity {
                    agent_id: entry.agent_id.clone(),
                    customer_id: entry.customer_id.clone(),
                },
            );
        }
        info!(keys = api_keys.len(), "loaded provisioned agent API keys");

        Ok(Self {
            api_keys,
            tokens: SessionTokenCodec::new(&config.jwt_secret, config.jwt_expiration_secs),
        })
    }

    /// Resolve an agent API key to its authenticated identity
    pub fn authenticate_agent(&self, api_key: &str) -> Result<AgentIdentity> {
        if api_key.is_empty() {
            return Err(Error::Auth(AuthError::MissingCredential));
        }

        let digest = hex::encode(Sha256::digest(api_key.as_bytes()));
        self.api_keys
            .get(&digest)
            .map(|entry| entry.value().clone())
            .ok_or(Error::Auth(AuthError::InvalidApiKey))
    }

    /// Resolve a dashboard session token to its authenticated identity
    pub fn authenticate_session(&self, token: &str) -> Result<SessionIdentity> {
        if token.is_empty() {
            return Err(Error::Auth(AuthError::MissingCredential));
        }
        self.tokens.validate(token)
    }

    /// Issue a session token (operator tooling and tests)
    pub fn issue_session_token(&self, identity: &SessionIdentity) -> Result<String> {
        self.tokens.issue(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsignal_common::config::ApiKeyEntry;

    fn manager_with_key(plaintext: &str) -> SecurityManager {
        let config = SecurityConfig {
            jwt_secret: "unit-test-secret".to_string(),
            jwt_expiration_secs: 3600,
            api_keys: vec![ApiKeyEntry {
                key_sha256: hex::encode(Sha256::digest(plaintext.as_bytes())),
                agent_id: "agent-9".to_string(),
                customer_id: "customer-4".to_string(),
            }],
        };
        SecurityManager::new(&config).unwrap()
    }

    #[test]
    fn test_valid_api_key_resolves_identity() {
        let manager = manager_with_key("sk-live-abc");
        let identity = manager.authenticate_agent("sk-live-abc").unwrap();
        assert_eq!(identity.agent_id, "agent-9");
        assert_eq!(identity.customer_id, "customer-4");
    }

    #[test]
    fn test_unknown_api_key_rejected() {
        let manager = manager_with_key("sk-live-abc");
        let err = manager.authenticate_agent("sk-live-wrong").unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let manager = manager_with_key("sk-live-abc");
        assert!(manager.authenticate_agent("").is_err());
        assert!(manager.authenticate_session("").is_err());
    }

    #[test]
    fn test_session_round_trip() {
        let manager = manager_with_key("sk-live-abc");
        let identity = SessionIdentity {
            user_id: "user-1".to_string(),
            company_id: "company-2".to_string(),
            role: "admin".to_string(),
        };
        let token = manager.issue_session_token(&identity).unwrap();
        assert_eq!(manager.authenticate_session(&token).unwrap(), identity);
    }
}
