//! Access token signing
//!
//! Signs RS256 access tokens from a local PEM private key. Key
//! distribution (JWKS) and verification belong to the consuming resource
//! servers, not to this service.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

use keyturn_core::error::{ApiError, Result};
use keyturn_core::platform::{AccessTokenIssuer, Clock, SignRequest, SignedAccessToken};

/// Access token claims
#[derive(Serialize)]
struct AccessClaims {
    iss: String,
    sub: String,
    client_id: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
    jti: String,
}

/// RS256 issuer backed by a PEM private key
pub struct JwtAccessTokenIssuer {
    issuer: String,
    key: EncodingKey,
    clock: Box<dyn Clock>,
}

impl JwtAccessTokenIssuer {
    pub fn from_pem(issuer: impl Into<String>, pem: &str, clock: Box<dyn Clock>) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| ApiError::internal(format!("invalid signing key: {}", e)))?;
        Ok(Self {
            issuer: issuer.into(),
            key,
            clock,
        })
    }
}

#[async_trait]
impl AccessTokenIssuer for JwtAccessTokenIssuer {
    async fn sign(&self, request: SignRequest<'_>) -> Result<SignedAccessToken> {
        let now = self.clock.now().timestamp();
        let claims = AccessClaims {
            iss: self.issuer.clone(),
            sub: request.subject_id.to_string(),
            client_id: request.client_id.to_string(),
            scope: request.scope.to_string(),
            aud: request.audience.to_string(),
            iat: now,
            exp: now + request.expires_in_secs as i64,
            jti: Uuid::new_v4().to_string(),
        };

        let header = Header::new(Algorithm::RS256);
        let token = encode(&header, &claims, &self.key)
            .map_err(|e| ApiError::upstream_unavailable(format!("failed to sign access token: {}", e)))?;

        Ok(SignedAccessToken {
            token,
            expires_in: request.expires_in_secs,
        })
    }
}
