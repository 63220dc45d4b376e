//! Credential signing and verification.

use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TokenSigningConfig;
use crate::models::JwtToken;

#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("token signing failed: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    #[error("token is expired")]
    Expired,

    #[error("token verification failed: {0}")]
    Verify(#[source] jsonwebtoken::errors::Error),
}

/// Claims carried by a signed role credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    /// `proj:<project>:<role>`
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Signs and verifies role credentials.
///
/// The claims of a credential come verbatim from the stored token record;
/// implementations add nothing beyond their issuer name.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Sign a credential for `subject` from its stored record.
    async fn sign(&self, subject: &str, token: &JwtToken) -> Result<String, IssuerError>;

    /// Verify a credential and return its claims.
    async fn verify(&self, credential: &str) -> Result<TokenClaims, IssuerError>;
}

/// HS256 issuer with a shared signing secret.
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtIssuer {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
        }
    }

    pub fn from_config(config: &TokenSigningConfig) -> Self {
        Self::new(config.secret.as_bytes(), &config.issuer)
    }
}

#[async_trait]
impl CredentialIssuer for JwtIssuer {
    async fn sign(&self, subject: &str, token: &JwtToken) -> Result<String, IssuerError> {
        let claims = TokenClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            iat: token.issued_at,
            nbf: token.issued_at,
            exp: token.expires_at,
            jti: token.id.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(IssuerError::Sign)
    }

    async fn verify(&self, credential: &str) -> Result<TokenClaims, IssuerError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Non-expiring tokens are legal; an `exp` that is present is still
        // enforced.
        validation.required_spec_claims.clear();
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<TokenClaims>(credential, &self.decoding_key, &validation).map_err(
            |err| match err.kind() {
                ErrorKind::ExpiredSignature => IssuerError::Expired,
                _ => IssuerError::Verify(err),
            },
        )?;
        Ok(data.claims)
    }
}
