//! Platform abstraction traits
//!
//! These traits define the boundary between the rotation authority core and
//! its collaborators (persistent store, access-token signing, environment,
//! wall clock). The core never imports a concrete backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::scope::ScopeSet;
use crate::token::{FamilyId, FamilySnapshot, RefreshToken, TokenFamily, TokenId};

/// A change applied to one family under its serialization point.
///
/// Each variant is a complete, atomic transition: either everything in it
/// is committed or nothing is.
#[derive(Debug, Clone)]
pub enum FamilyChange {
    /// Retire the exchanged token to `Rotated` and install its successor
    /// as the new active head
    Rotate {
        rotated: TokenId,
        successor: RefreshToken,
        used_at: DateTime<Utc>,
    },
    /// Revoke the whole family: mark it revoked, clear the head pointer,
    /// and transition every still-active token to `Revoked`. Idempotent.
    RevokeFamily { at: DateTime<Utc> },
}

/// Durable token/family storage with per-family compare-and-swap.
///
/// `apply` and `remove` take the version observed in a prior snapshot and
/// must fail with `ApiError::ConflictRetry` when the family has moved on,
/// so that all state transitions for one family are serialized. Families
/// are independent units of concurrency; no cross-family atomicity is
/// required.
#[async_trait]
pub trait Store: Send + Sync {
    /// Resolve a token id to its family, if the token is known
    async fn find_family_of(&self, token_id: &TokenId) -> Result<Option<FamilyId>>;

    /// Consistent read of a family and its token lineage
    async fn load(&self, family_id: &FamilyId) -> Result<Option<FamilySnapshot>>;

    /// Create a new family together with its root token
    async fn create(&self, family: TokenFamily, root: RefreshToken) -> Result<()>;

    /// Apply one change if the family is still at `expected_version`
    async fn apply(
        &self,
        family_id: &FamilyId,
        expected_version: u64,
        change: FamilyChange,
    ) -> Result<()>;

    /// All family ids currently stored (retention sweep input)
    async fn list_families(&self) -> Result<Vec<FamilyId>>;

    /// Delete a family and its tokens if still at `expected_version`
    async fn remove(&self, family_id: &FamilyId, expected_version: u64) -> Result<()>;
}

/// Parameters for signing one access token
pub struct SignRequest<'a> {
    pub subject_id: &'a str,
    pub client_id: &'a str,
    pub scope: &'a ScopeSet,
    pub audience: &'a str,
    pub expires_in_secs: u64,
}

/// A signed access token and its lifetime
pub struct SignedAccessToken {
    pub token: String,
    pub expires_in: u64,
}

/// Access-token signing collaborator.
///
/// Failures here are dependency failures: they surface as
/// `UpstreamUnavailable` and must never leave family state half-transitioned
/// (the handlers sign before committing any change).
#[async_trait]
pub trait AccessTokenIssuer: Send + Sync {
    async fn sign(&self, request: SignRequest<'_>) -> Result<SignedAccessToken>;
}

/// Clock for current time (enables testing with deterministic timestamps)
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Environment/secrets access
pub trait Environment {
    fn get_var(&self, name: &str) -> Result<String>;
    fn get_secret(&self, name: &str) -> Result<String>;
}
