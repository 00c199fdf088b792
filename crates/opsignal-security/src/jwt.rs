//! Session token encode/decode

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use opsignal_common::error::{AuthError, Error, Result};
use opsignal_common::types::SessionIdentity;

/// JWT claims for a dashboard session
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub company_id: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

/// HS256 session-token codec
pub struct SessionTokenCodec {
    secret: String,
    expiration_secs: u64,
}

impl SessionTokenCodec {
    #[must_use]
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            secret: secret.to_string(),
            expiration_secs,
        }
    }

    /// Issue a session token for a dashboard user
    pub fn issue(&self, identity: &SessionIdentity) -> Result<String> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: identity.user_id.clone(),
            company_id: identity.company_id.clone(),
            role: identity.role.clone(),
            exp: now + self.expiration_secs as usize,
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| Error::Auth(AuthError::InvalidToken(e.to_string())))
    }

    /// Validate a session token and recover the caller's identity
    pub fn validate(&self, token: &str) -> Result<SessionIdentity> {
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                Error::Auth(AuthError::TokenExpired)
            }
            _ => Error::Auth(AuthError::InvalidToken(e.to_string())),
        })?;

        Ok(SessionIdentity {
            user_id: token_data.claims.sub,
            company_id: token_data.claims.company_id,
            role: token_data.claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            user_id: "user-7".to_string(),
            company_id: "company-3".to_string(),
            role: "viewer".to_string(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let codec = SessionTokenCodec::new("unit-test-secret", 3600);
        let token = codec.issue(&identity()).unwrap();
        let recovered = codec.validate(&token).unwrap();
        assert_eq!(recovered, identity());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let codec = SessionTokenCodec::new("secret-a", 3600);
        let other = SessionTokenCodec::new("secret-b", 3600);
        let token = codec.issue(&identity()).unwrap();
        let err = other.validate(&token).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let codec = SessionTokenCodec::new("secret", 3600);
        assert!(codec.validate("not.a.token").is_err());
    }
}
