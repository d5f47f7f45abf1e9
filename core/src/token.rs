//! Refresh token and token family data model
//!
//! Tokens are organized into families: the full rotation lineage descending
//! from one original grant. The store never sees the bearer secret itself,
//! only its SHA-256 hash.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Number of random bytes in a freshly minted refresh token secret
const SECRET_BYTES: usize = 32;

/// Opaque token identifier: the hex SHA-256 of the bearer secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Derive the identifier for a bearer secret
    pub fn from_secret(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier grouping all tokens descended from one original grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyId(Uuid);

impl FamilyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for FamilyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Generate a fresh unguessable bearer secret (base64url, no padding)
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A second count as a `Duration`, saturating instead of wrapping for
/// values beyond what chrono can represent
pub(crate) fn saturating_secs(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

fn expiry(now: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    now.checked_add_signed(saturating_secs(ttl_secs))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Lifecycle state of a refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
    /// Usable exactly once, as the family head
    Active,
    /// Successfully exchanged; presenting it again is a reuse event
    Rotated,
    /// Killed by reuse detection or explicit revocation
    Revoked,
}

/// A refresh token record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: TokenId,
    pub family_id: FamilyId,
    pub status: TokenStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// None only for the family's root token
    pub predecessor_id: Option<TokenId>,
    pub client_id: String,
    pub subject_id: String,
    /// Scope of the original grant; access tokens may narrow it per request
    pub scope: crate::scope::ScopeSet,
    pub audience: String,
}

impl RefreshToken {
    /// Create the root token of a new family
    pub fn root(
        id: TokenId,
        family_id: FamilyId,
        client_id: String,
        subject_id: String,
        scope: crate::scope::ScopeSet,
        audience: String,
        now: DateTime<Utc>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            id,
            family_id,
            status: TokenStatus::Active,
            issued_at: now,
            expires_at: expiry(now, ttl_secs),
            predecessor_id: None,
            client_id,
            subject_id,
            scope,
            audience,
        }
    }

    /// Create the successor minted when this token is exchanged.
    ///
    /// Family, client, subject, audience, and grant scope carry over; the
    /// successor records this token as its predecessor.
    pub fn successor(&self, id: TokenId, now: DateTime<Utc>, ttl_secs: u64) -> Self {
        Self {
            id,
            family_id: self.family_id,
            status: TokenStatus::Active,
            issued_at: now,
            expires_at: expiry(now, ttl_secs),
            predecessor_id: Some(self.id.clone()),
            client_id: self.client_id.clone(),
            subject_id: self.subject_id.clone(),
            scope: self.scope.clone(),
            audience: self.audience.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A token family: the aggregate root for all per-family state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenFamily {
    pub family_id: FamilyId,
    pub client_id: String,
    pub subject_id: String,
    /// The currently valid token, or None once the family is revoked
    pub head_token_id: Option<TokenId>,
    /// Monotonic: once true it never flips back
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl TokenFamily {
    /// Create a family rooted at the given token
    pub fn rooted_at(root: &RefreshToken, now: DateTime<Utc>) -> Self {
        Self {
            family_id: root.family_id,
            client_id: root.client_id.clone(),
            subject_id: root.subject_id.clone(),
            head_token_id: Some(root.id.clone()),
            revoked: false,
            created_at: now,
            last_used_at: now,
        }
    }
}

/// Consistent read of a family and its full token lineage.
///
/// `version` is the compare-and-swap handle: every committed change to the
/// family bumps it, and `Store::apply` refuses changes built against a
/// stale version.
#[derive(Debug, Clone)]
pub struct FamilySnapshot {
    pub family: TokenFamily,
    pub tokens: Vec<RefreshToken>,
    pub version: u64,
}

impl FamilySnapshot {
    pub fn token(&self, id: &TokenId) -> Option<&RefreshToken> {
        self.tokens.iter().find(|t| &t.id == id)
    }

    /// The currently active head token, if any
    pub fn head(&self) -> Option<&RefreshToken> {
        self.family
            .head_token_id
            .as_ref()
            .and_then(|id| self.token(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeSet;

    fn root_token(now: DateTime<Utc>) -> RefreshToken {
        RefreshToken::root(
            TokenId::from_secret("secret-1"),
            FamilyId::new(),
            "client-1".into(),
            "subject-1".into(),
            ScopeSet::parse("openid profile"),
            "https://api.example.com".into(),
            now,
            3600,
        )
    }

    #[test]
    fn test_token_id_is_hash_of_secret() {
        let a = TokenId::from_secret("secret");
        let b = TokenId::from_secret("secret");
        let c = TokenId::from_secret("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_generate_secret_is_unique_and_url_safe() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_root_token_has_no_predecessor() {
        let token = root_token(Utc::now());
        assert_eq!(token.status, TokenStatus::Active);
        assert!(token.predecessor_id.is_none());
    }

    #[test]
    fn test_successor_links_predecessor_and_keeps_grant() {
        let now = Utc::now();
        let root = root_token(now);
        let next = root.successor(TokenId::from_secret("secret-2"), now, 3600);

        assert_eq!(next.family_id, root.family_id);
        assert_eq!(next.predecessor_id, Some(root.id.clone()));
        assert_eq!(next.client_id, root.client_id);
        assert_eq!(next.subject_id, root.subject_id);
        assert_eq!(next.scope, root.scope);
        assert_eq!(next.status, TokenStatus::Active);
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let token = root_token(now);
        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::seconds(3600)));
    }

    #[test]
    fn test_absurd_ttl_saturates_instead_of_wrapping() {
        let now = Utc::now();
        let token = RefreshToken::root(
            TokenId::from_secret("secret-1"),
            FamilyId::new(),
            "client-1".into(),
            "subject-1".into(),
            ScopeSet::parse("read"),
            "https://api.example.com".into(),
            now,
            u64::MAX,
        );
        // A wrap would put expires_at in the past and kill the token at birth
        assert!(!token.is_expired(now));
        assert!(token.expires_at > now);
    }

    #[test]
    fn test_family_rooted_at() {
        let now = Utc::now();
        let root = root_token(now);
        let family = TokenFamily::rooted_at(&root, now);
        assert_eq!(family.family_id, root.family_id);
        assert_eq!(family.head_token_id, Some(root.id.clone()));
        assert!(!family.revoked);
    }
}
