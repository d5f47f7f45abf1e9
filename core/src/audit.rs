//! Audit event model
//!
//! Every grant, exchange, or revocation attempt emits exactly one audit
//! event. Emission happens after the transactional state change commits
//! and is fire-and-forget: a slow or broken sink never blocks or fails
//! the caller's exchange decision.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::token::{FamilyId, TokenId};

/// Outcome code carried by an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// New family and root token created
    Granted,
    /// Head token exchanged for a successor
    Rotated,
    /// A rotated or revoked token was presented; the family was revoked
    ReuseDetected,
    /// Exchange attempted against an already-revoked family
    FamilyRevokedAttempt,
    /// The presented secret matched no known token
    UnknownToken,
    /// The presenting client does not own the token
    ClientMismatch,
    /// The head token itself had expired
    TokenExpired,
    /// Requested scope was not covered by the original grant
    ScopeExceeded,
    /// Explicit revocation applied
    Revoked,
    /// Explicit revocation of a token or family we do not know
    RevokeUnknown,
}

impl AuditOutcome {
    /// Stable wire code for log pipelines.
    ///
    /// `ferrt` (failed exchange, reuse detected) matches the event code
    /// used by identity-provider security logs for rotation reuse.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Granted => "grant",
            Self::Rotated => "rotation",
            Self::ReuseDetected => "ferrt",
            Self::FamilyRevokedAttempt => "family_revoked_exchange_attempt",
            Self::UnknownToken => "unknown_token",
            Self::ClientMismatch => "client_mismatch",
            Self::TokenExpired => "token_expired",
            Self::ScopeExceeded => "scope_exceeded",
            Self::Revoked => "revoked",
            Self::RevokeUnknown => "revoke_unknown",
        }
    }
}

/// One structured audit record
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at: DateTime<Utc>,
    pub outcome: AuditOutcome,
    pub client_id: String,
    pub family_id: Option<FamilyId>,
    pub subject_id: Option<String>,
    /// Set on reuse detection: the rotated/revoked token that was presented
    pub offending_token_id: Option<TokenId>,
}

impl AuditEvent {
    pub fn new(outcome: AuditOutcome, client_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            at,
            outcome,
            client_id: client_id.into(),
            family_id: None,
            subject_id: None,
            offending_token_id: None,
        }
    }

    pub fn family(mut self, family_id: FamilyId) -> Self {
        self.family_id = Some(family_id);
        self
    }

    pub fn subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn offender(mut self, token_id: TokenId) -> Self {
        self.offending_token_id = Some(token_id);
        self
    }
}

/// Audit sink collaborator.
///
/// `emit` must return immediately; buffering and delivery retries belong
/// to the sink implementation (e.g. a channel drained by a log pipeline),
/// and delivery failures must be reported there, not swallowed.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_codes_are_stable() {
        assert_eq!(AuditOutcome::ReuseDetected.code(), "ferrt");
        assert_eq!(
            AuditOutcome::FamilyRevokedAttempt.code(),
            "family_revoked_exchange_attempt"
        );
        assert_eq!(AuditOutcome::Rotated.code(), "rotation");
        assert_eq!(AuditOutcome::Granted.code(), "grant");
    }

    #[test]
    fn test_event_builder() {
        let family_id = FamilyId::new();
        let offender = TokenId::from_secret("stolen");
        let event = AuditEvent::new(AuditOutcome::ReuseDetected, "client-1", Utc::now())
            .family(family_id)
            .subject("subject-1")
            .offender(offender.clone());

        assert_eq!(event.family_id, Some(family_id));
        assert_eq!(event.subject_id.as_deref(), Some("subject-1"));
        assert_eq!(event.offending_token_id, Some(offender));
    }

    #[test]
    fn test_event_serializes_with_snake_case_outcome() {
        let event = AuditEvent::new(AuditOutcome::UnknownToken, "client-1", Utc::now());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"], "unknown_token");
    }
}
