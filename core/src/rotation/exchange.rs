//! Token exchange
//!
//! Exchanges the active head of a token family for a fresh access/refresh
//! pair, rotating the presented token. Presenting any token that is no
//! longer the active head is a reuse event and revokes the entire family,
//! including the legitimate current head.
//!
//! All dispatch between the rotate path and the reuse path happens against
//! one family snapshot and commits through the store's per-family
//! compare-and-swap; a lost race re-reads and re-dispatches, so two
//! concurrent exchanges of the same token resolve to exactly one success.

use serde::Serialize;

use crate::audit::{AuditEvent, AuditOutcome, AuditSink};
use crate::config::{Config, ScopePolicy};
use crate::error::{ApiError, Result};
use crate::platform::{AccessTokenIssuer, Clock, FamilyChange, SignRequest, Store};
use crate::scope::ScopeSet;
use crate::token::{self, TokenId, TokenStatus};

/// Parameters for one exchange attempt
pub struct ExchangeRequest {
    /// The bearer secret being presented
    pub refresh_token: String,
    pub client_id: String,
    /// Optional scope narrowing; must be covered by the original grant
    pub requested_scope: Option<ScopeSet>,
}

/// Token pair returned for a successful exchange
#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
}

/// Handle a token exchange request
pub async fn handle(
    request: ExchangeRequest,
    store: &dyn Store,
    issuer: &dyn AccessTokenIssuer,
    audit: &dyn AuditSink,
    clock: &dyn Clock,
    config: &Config,
) -> Result<ExchangeResponse> {
    let token_id = TokenId::from_secret(&request.refresh_token);

    for _attempt in 0..config.max_apply_attempts {
        let now = clock.now();

        // 1. Resolve the presented secret. Nothing is created or audited
        //    against a family that does not exist.
        let Some(family_id) = store.find_family_of(&token_id).await? else {
            audit.emit(AuditEvent::new(
                AuditOutcome::UnknownToken,
                request.client_id.clone(),
                now,
            ));
            return Err(ApiError::invalid_grant("unknown refresh token"));
        };
        // The family can vanish between the index hit and this read (a
        // concurrent retention sweep); a gone token is an unknown token.
        let Some(snapshot) = store.load(&family_id).await? else {
            audit.emit(AuditEvent::new(
                AuditOutcome::UnknownToken,
                request.client_id.clone(),
                now,
            ));
            return Err(ApiError::invalid_grant("unknown refresh token"));
        };
        let Some(token) = snapshot.token(&token_id) else {
            audit.emit(AuditEvent::new(
                AuditOutcome::UnknownToken,
                request.client_id.clone(),
                now,
            ));
            return Err(ApiError::invalid_grant("unknown refresh token"));
        };

        // 2. A revoked family is permanently dead.
        if snapshot.family.revoked {
            audit.emit(
                AuditEvent::new(AuditOutcome::FamilyRevokedAttempt, request.client_id.clone(), now)
                    .family(family_id)
                    .subject(token.subject_id.clone()),
            );
            return Err(ApiError::invalid_grant("family revoked"));
        }

        // 3. Reuse: the token was already rotated or revoked. Revoke the
        //    whole family, head included.
        if token.status != TokenStatus::Active {
            match store
                .apply(&family_id, snapshot.version, FamilyChange::RevokeFamily { at: now })
                .await
            {
                Ok(()) => {
                    audit.emit(
                        AuditEvent::new(AuditOutcome::ReuseDetected, request.client_id.clone(), now)
                            .family(family_id)
                            .subject(token.subject_id.clone())
                            .offender(token_id),
                    );
                    return Err(ApiError::invalid_grant("token reuse detected"));
                }
                Err(ApiError::ConflictRetry) => continue,
                Err(e) => return Err(e),
            }
        }

        // 4. Active token: verify binding and freshness before rotating.
        if snapshot.family.head_token_id.as_ref() != Some(&token_id) {
            return Err(ApiError::internal(format!(
                "active token is not the head of family {}",
                family_id
            )));
        }
        if token.client_id != request.client_id {
            audit.emit(
                AuditEvent::new(AuditOutcome::ClientMismatch, request.client_id.clone(), now)
                    .family(family_id)
                    .subject(token.subject_id.clone()),
            );
            return Err(ApiError::invalid_grant("token not issued to this client"));
        }
        if token.is_expired(now) {
            audit.emit(
                AuditEvent::new(AuditOutcome::TokenExpired, request.client_id.clone(), now)
                    .family(family_id)
                    .subject(token.subject_id.clone()),
            );
            return Err(ApiError::invalid_grant("refresh token expired"));
        }

        let scope = match narrow_scope(request.requested_scope.as_ref(), &token.scope, config.scope_policy) {
            Ok(scope) => scope,
            Err(e) => {
                audit.emit(
                    AuditEvent::new(AuditOutcome::ScopeExceeded, request.client_id.clone(), now)
                        .family(family_id)
                        .subject(token.subject_id.clone()),
                );
                return Err(e);
            }
        };

        // 5. Sign first, commit second: a signer failure must leave the
        //    family untouched, and a commit conflict discards the signed
        //    token and retries.
        let signed = issuer
            .sign(SignRequest {
                subject_id: &token.subject_id,
                client_id: &token.client_id,
                scope: &scope,
                audience: &token.audience,
                expires_in_secs: config.access_ttl_secs,
            })
            .await?;

        let secret = token::generate_secret();
        let successor = token.successor(TokenId::from_secret(&secret), now, config.refresh_ttl_secs);
        let subject_id = token.subject_id.clone();

        match store
            .apply(
                &family_id,
                snapshot.version,
                FamilyChange::Rotate {
                    rotated: token_id.clone(),
                    successor,
                    used_at: now,
                },
            )
            .await
        {
            Ok(()) => {
                audit.emit(
                    AuditEvent::new(AuditOutcome::Rotated, request.client_id.clone(), now)
                        .family(family_id)
                        .subject(subject_id),
                );
                return Ok(ExchangeResponse {
                    access_token: signed.token,
                    refresh_token: secret,
                    token_type: "Bearer".to_string(),
                    expires_in: signed.expires_in,
                    scope: scope.to_string(),
                });
            }
            Err(ApiError::ConflictRetry) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(ApiError::internal("exchange retry budget exhausted"))
}

/// Narrow a requested scope against the original grant.
///
/// No request means the full grant. A wider request either fails or is cut
/// down to the intersection, depending on policy.
fn narrow_scope(
    requested: Option<&ScopeSet>,
    granted: &ScopeSet,
    policy: ScopePolicy,
) -> Result<ScopeSet> {
    match requested {
        None => Ok(granted.clone()),
        Some(requested) if requested.is_subset_of(granted) => Ok(requested.clone()),
        Some(requested) => match policy {
            ScopePolicy::Strict => Err(ApiError::scope_exceeded(
                "requested scope is not a subset of the original grant",
            )),
            ScopePolicy::Downgrade => Ok(requested.intersection(granted)),
        },
    }
}
