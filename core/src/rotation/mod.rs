//! Rotation authority operations
//!
//! The three caller-facing operations of the token endpoint: grant a new
//! family, exchange the head token for a fresh pair, and revoke a token's
//! family. Plus a non-mutating introspection lookup for diagnostics.

pub mod exchange;
pub mod grant;
pub mod revoke;

pub use exchange::{ExchangeRequest, ExchangeResponse};
pub use grant::{GrantRequest, GrantResponse};
pub use revoke::RevokeRequest;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::platform::{Clock, Store};
use crate::token::{FamilyId, TokenId, TokenStatus};

/// Read-only view of a presented refresh token's state.
///
/// Unlike `Exchange`, this never mutates family state and never takes the
/// per-family write path; it reads one snapshot and reports on it. The
/// detail fields are for trusted callers only; an unauthenticated wire
/// surface must expose nothing beyond `active`.
#[derive(Debug, Clone, Serialize)]
pub struct Introspection {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TokenStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_id: Option<FamilyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Introspection {
    fn inactive() -> Self {
        Self {
            active: false,
            status: None,
            family_id: None,
            client_id: None,
            subject_id: None,
            scope: None,
            expires_at: None,
        }
    }
}

/// Look up the state of a refresh token without touching it
pub async fn introspect(
    refresh_token: &str,
    store: &dyn Store,
    clock: &dyn Clock,
) -> Result<Introspection> {
    let token_id = TokenId::from_secret(refresh_token);

    let Some(family_id) = store.find_family_of(&token_id).await? else {
        return Ok(Introspection::inactive());
    };
    let Some(snapshot) = store.load(&family_id).await? else {
        return Ok(Introspection::inactive());
    };
    let Some(token) = snapshot.token(&token_id) else {
        return Ok(Introspection::inactive());
    };

    let now = clock.now();
    let is_head = snapshot.family.head_token_id.as_ref() == Some(&token_id);
    let active = token.status == TokenStatus::Active
        && is_head
        && !snapshot.family.revoked
        && !token.is_expired(now);

    Ok(Introspection {
        active,
        status: Some(token.status),
        family_id: Some(family_id),
        client_id: Some(token.client_id.clone()),
        subject_id: Some(token.subject_id.clone()),
        scope: Some(token.scope.to_string()),
        expires_at: Some(token.expires_at),
    })
}
