//! Initial grant
//!
//! Creates a new token family with its root refresh token, after the
//! caller has authenticated the resource owner through whatever flow
//! applies (authorization code, device flow, ...). Authentication itself
//! is outside the rotation authority.

use serde::Serialize;

use crate::audit::{AuditEvent, AuditOutcome, AuditSink};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::platform::{AccessTokenIssuer, Clock, SignRequest, Store};
use crate::scope::ScopeSet;
use crate::token::{self, FamilyId, RefreshToken, TokenFamily, TokenId};

/// Parameters for creating a new family
pub struct GrantRequest {
    pub client_id: String,
    pub subject_id: String,
    pub scope: ScopeSet,
    pub audience: String,
}

/// Token pair returned for a fresh grant
#[derive(Serialize)]
pub struct GrantResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
    /// Returned so administrative tooling can revoke the whole lineage
    pub family_id: FamilyId,
}

/// Handle an initial grant request
pub async fn handle(
    request: GrantRequest,
    store: &dyn Store,
    issuer: &dyn AccessTokenIssuer,
    audit: &dyn AuditSink,
    clock: &dyn Clock,
    config: &Config,
) -> Result<GrantResponse> {
    if request.client_id.is_empty() {
        return Err(ApiError::invalid_request("client_id cannot be empty"));
    }
    if request.subject_id.is_empty() {
        return Err(ApiError::invalid_request("subject_id cannot be empty"));
    }

    let now = clock.now();

    // Sign before any state change so a signer failure leaves nothing behind
    let signed = issuer
        .sign(SignRequest {
            subject_id: &request.subject_id,
            client_id: &request.client_id,
            scope: &request.scope,
            audience: &request.audience,
            expires_in_secs: config.access_ttl_secs,
        })
        .await?;

    let secret = token::generate_secret();
    let root = RefreshToken::root(
        TokenId::from_secret(&secret),
        FamilyId::new(),
        request.client_id.clone(),
        request.subject_id.clone(),
        request.scope.clone(),
        request.audience,
        now,
        config.refresh_ttl_secs,
    );
    let family = TokenFamily::rooted_at(&root, now);
    let family_id = family.family_id;
    let scope = root.scope.to_string();

    store.create(family, root).await?;

    audit.emit(
        AuditEvent::new(AuditOutcome::Granted, request.client_id, now)
            .family(family_id)
            .subject(request.subject_id),
    );

    Ok(GrantResponse {
        access_token: signed.token,
        refresh_token: secret,
        token_type: "Bearer".to_string(),
        expires_in: signed.expires_in,
        scope,
        family_id,
    })
}
