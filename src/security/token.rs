//! Token verification capability.
//!
//! The gateway only asks "is this token valid, and what are its claims?".
//! `JwtVerifier` answers that for HS256-signed JWTs.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::config::schema::AuthConfig;
use crate::gateway::error::CapabilityError;

pub type Claims = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Valid(Claims),
    Invalid,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Verification, CapabilityError>;
}

/// HMAC-SHA256 JWT verification.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8], leeway_secs: u64, require_exp: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        if !require_exp {
            validation.required_spec_claims.clear();
        }
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.secret.as_bytes(), config.leeway_secs, config.require_exp)
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Verification, CapabilityError> {
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Ok(Verification::Valid(data.claims)),
            Err(err) => match err.kind() {
                ErrorKind::InvalidKeyFormat => {
                    Err(CapabilityError::Misconfigured(err.to_string()))
                }
                _ => {
                    tracing::debug!(error = %err, "Token rejected");
                    Ok(Verification::Invalid)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn token(secret: &str, claims: Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_returns_claims() {
        let verifier = JwtVerifier::new(b"k", 0, true);
        let t = token("k", json!({ "sub": "alice", "exp": now() + 60 }));
        match verifier.verify(&t).await.unwrap() {
            Verification::Valid(claims) => assert_eq!(claims["sub"], "alice"),
            other => panic!("expected valid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_secret_is_invalid() {
        let verifier = JwtVerifier::new(b"k", 0, true);
        let t = token("other", json!({ "sub": "alice", "exp": now() + 60 }));
        assert_eq!(verifier.verify(&t).await.unwrap(), Verification::Invalid);
    }

    #[tokio::test]
    async fn test_expired_token_is_invalid() {
        let verifier = JwtVerifier::new(b"k", 0, true);
        let t = token("k", json!({ "sub": "alice", "exp": now() - 120 }));
        assert_eq!(verifier.verify(&t).await.unwrap(), Verification::Invalid);
    }

    #[tokio::test]
    async fn test_missing_exp_depends_on_policy() {
        let t = token("k", json!({ "sub": "alice" }));
        let strict = JwtVerifier::new(b"k", 0, true);
        assert_eq!(strict.verify(&t).await.unwrap(), Verification::Invalid);

        let lenient = JwtVerifier::new(b"k", 0, false);
        assert!(matches!(lenient.verify(&t).await.unwrap(), Verification::Valid(_)));
    }

    #[tokio::test]
    async fn test_garbage_is_invalid() {
        let verifier = JwtVerifier::new(b"k", 0, true);
        assert_eq!(verifier.verify("not.a.jwt").await.unwrap(), Verification::Invalid);
    }
}
