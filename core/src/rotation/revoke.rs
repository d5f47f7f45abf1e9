//! Explicit revocation
//!
//! Administrative or user-initiated revocation of a refresh token's family,
//! with the same family-wide effect as reuse detection. Revoking a token or
//! family we do not know succeeds silently (RFC 7009 behavior) so the
//! endpoint is not an oracle for valid secrets.

use crate::audit::{AuditEvent, AuditOutcome, AuditSink};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::platform::{Clock, FamilyChange, Store};
use crate::token::{FamilyId, TokenId};

/// What to revoke: a presented bearer secret, or a whole family by id
pub enum RevokeRequest {
    Token(String),
    Family(FamilyId),
}

/// Handle a revocation request. Idempotent: revoking an already-revoked
/// family succeeds without a second audit event.
pub async fn handle(
    request: RevokeRequest,
    store: &dyn Store,
    audit: &dyn AuditSink,
    clock: &dyn Clock,
    config: &Config,
) -> Result<()> {
    let family_id = match request {
        RevokeRequest::Family(family_id) => Some(family_id),
        RevokeRequest::Token(secret) => {
            store
                .find_family_of(&TokenId::from_secret(&secret))
                .await?
        }
    };

    let Some(family_id) = family_id else {
        audit.emit(AuditEvent::new(
            AuditOutcome::RevokeUnknown,
            "unknown",
            clock.now(),
        ));
        return Ok(());
    };

    for _attempt in 0..config.max_apply_attempts {
        let now = clock.now();
        let Some(snapshot) = store.load(&family_id).await? else {
            audit.emit(
                AuditEvent::new(AuditOutcome::RevokeUnknown, "unknown", now).family(family_id),
            );
            return Ok(());
        };

        if snapshot.family.revoked {
            return Ok(());
        }

        match store
            .apply(&family_id, snapshot.version, FamilyChange::RevokeFamily { at: now })
            .await
        {
            Ok(()) => {
                audit.emit(
                    AuditEvent::new(AuditOutcome::Revoked, snapshot.family.client_id.clone(), now)
                        .family(family_id)
                        .subject(snapshot.family.subject_id.clone()),
                );
                return Ok(());
            }
            Err(ApiError::ConflictRetry) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(ApiError::internal("revoke retry budget exhausted"))
}
