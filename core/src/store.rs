//! In-memory store
//!
//! `MemoryStore` keeps each family as one aggregate record behind its own
//! lock, with a version counter implementing the compare-and-swap contract
//! of [`Store`]. A token-id index resolves presented secrets to their
//! family. Suitable for single-node deployments and tests; a durable
//! backend implements the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ApiError, Result};
use crate::platform::{FamilyChange, Store};
use crate::token::{FamilyId, FamilySnapshot, RefreshToken, TokenFamily, TokenId, TokenStatus};

/// One family's aggregate state
struct FamilyRecord {
    family: TokenFamily,
    tokens: Vec<RefreshToken>,
    version: u64,
}

impl FamilyRecord {
    fn snapshot(&self) -> FamilySnapshot {
        FamilySnapshot {
            family: self.family.clone(),
            tokens: self.tokens.clone(),
            version: self.version,
        }
    }

    fn rotate(&mut self, rotated: &TokenId, successor: RefreshToken, used_at: DateTime<Utc>) {
        if let Some(token) = self.tokens.iter_mut().find(|t| &t.id == rotated) {
            token.status = TokenStatus::Rotated;
        }
        self.family.head_token_id = Some(successor.id.clone());
        self.family.last_used_at = used_at;
        self.tokens.push(successor);
    }

    fn revoke(&mut self, at: DateTime<Utc>) {
        self.family.revoked = true;
        self.family.head_token_id = None;
        self.family.last_used_at = at;
        for token in &mut self.tokens {
            if token.status == TokenStatus::Active {
                token.status = TokenStatus::Revoked;
            }
        }
    }
}

/// In-memory [`Store`] implementation.
///
/// Lock order is always family map, then family record, then token index.
pub struct MemoryStore {
    families: RwLock<HashMap<FamilyId, Arc<RwLock<FamilyRecord>>>>,
    index: RwLock<HashMap<TokenId, FamilyId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            families: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    async fn record(&self, family_id: &FamilyId) -> Option<Arc<RwLock<FamilyRecord>>> {
        self.families.read().await.get(family_id).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_family_of(&self, token_id: &TokenId) -> Result<Option<FamilyId>> {
        Ok(self.index.read().await.get(token_id).copied())
    }

    async fn load(&self, family_id: &FamilyId) -> Result<Option<FamilySnapshot>> {
        match self.record(family_id).await {
            Some(record) => Ok(Some(record.read().await.snapshot())),
            None => Ok(None),
        }
    }

    async fn create(&self, family: TokenFamily, root: RefreshToken) -> Result<()> {
        let family_id = family.family_id;
        let root_id = root.id.clone();

        let mut families = self.families.write().await;
        if families.contains_key(&family_id) {
            return Err(ApiError::internal(format!(
                "family {} already exists",
                family_id
            )));
        }

        let mut index = self.index.write().await;
        if index.contains_key(&root_id) {
            return Err(ApiError::internal("refresh token id collision"));
        }

        families.insert(
            family_id,
            Arc::new(RwLock::new(FamilyRecord {
                family,
                tokens: vec![root],
                version: 0,
            })),
        );
        index.insert(root_id, family_id);
        Ok(())
    }

    async fn apply(
        &self,
        family_id: &FamilyId,
        expected_version: u64,
        change: FamilyChange,
    ) -> Result<()> {
        let record = self
            .record(family_id)
            .await
            .ok_or_else(|| ApiError::internal(format!("family {} not found", family_id)))?;

        let mut record = record.write().await;
        if record.version != expected_version {
            return Err(ApiError::ConflictRetry);
        }

        match change {
            FamilyChange::Rotate {
                rotated,
                successor,
                used_at,
            } => {
                let successor_id = successor.id.clone();
                record.rotate(&rotated, successor, used_at);
                record.version += 1;
                self.index.write().await.insert(successor_id, *family_id);
            }
            FamilyChange::RevokeFamily { at } => {
                record.revoke(at);
                record.version += 1;
            }
        }
        Ok(())
    }

    async fn list_families(&self) -> Result<Vec<FamilyId>> {
        Ok(self.families.read().await.keys().copied().collect())
    }

    async fn remove(&self, family_id: &FamilyId, expected_version: u64) -> Result<()> {
        let mut families = self.families.write().await;
        let Some(record) = families.get(family_id) else {
            return Ok(());
        };

        let token_ids: Vec<TokenId> = {
            let record = record.read().await;
            if record.version != expected_version {
                return Err(ApiError::ConflictRetry);
            }
            record.tokens.iter().map(|t| t.id.clone()).collect()
        };

        families.remove(family_id);
        let mut index = self.index.write().await;
        for id in token_ids {
            index.remove(&id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeSet;

    fn seed(now: DateTime<Utc>) -> (TokenFamily, RefreshToken) {
        let root = RefreshToken::root(
            TokenId::from_secret("root-secret"),
            FamilyId::new(),
            "client-1".into(),
            "subject-1".into(),
            ScopeSet::parse("read write"),
            "https://api.example.com".into(),
            now,
            3600,
        );
        (TokenFamily::rooted_at(&root, now), root)
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (family, root) = seed(now);
        let family_id = family.family_id;
        let root_id = root.id.clone();

        store.create(family, root).await.unwrap();

        let found = store.find_family_of(&root_id).await.unwrap();
        assert_eq!(found, Some(family_id));

        let snapshot = store.load(&family_id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.tokens.len(), 1);
        assert_eq!(snapshot.family.head_token_id, Some(root_id));
    }

    #[tokio::test]
    async fn test_rotate_bumps_version_and_retires_token() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (family, root) = seed(now);
        let family_id = family.family_id;
        let root_id = root.id.clone();
        let successor = root.successor(TokenId::from_secret("next-secret"), now, 3600);
        let successor_id = successor.id.clone();

        store.create(family, root).await.unwrap();
        store
            .apply(
                &family_id,
                0,
                FamilyChange::Rotate {
                    rotated: root_id.clone(),
                    successor,
                    used_at: now,
                },
            )
            .await
            .unwrap();

        let snapshot = store.load(&family_id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.token(&root_id).unwrap().status, TokenStatus::Rotated);
        assert_eq!(snapshot.family.head_token_id, Some(successor_id.clone()));
        assert_eq!(
            store.find_family_of(&successor_id).await.unwrap(),
            Some(family_id)
        );
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (family, root) = seed(now);
        let family_id = family.family_id;

        store.create(family, root).await.unwrap();
        store
            .apply(&family_id, 0, FamilyChange::RevokeFamily { at: now })
            .await
            .unwrap();

        let err = store
            .apply(&family_id, 0, FamilyChange::RevokeFamily { at: now })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ConflictRetry));
    }

    #[tokio::test]
    async fn test_revoke_kills_active_tokens() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (family, root) = seed(now);
        let family_id = family.family_id;
        let root_id = root.id.clone();

        store.create(family, root).await.unwrap();
        store
            .apply(&family_id, 0, FamilyChange::RevokeFamily { at: now })
            .await
            .unwrap();

        let snapshot = store.load(&family_id).await.unwrap().unwrap();
        assert!(snapshot.family.revoked);
        assert_eq!(snapshot.family.head_token_id, None);
        assert_eq!(snapshot.token(&root_id).unwrap().status, TokenStatus::Revoked);
    }

    #[tokio::test]
    async fn test_remove_clears_index() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (family, root) = seed(now);
        let family_id = family.family_id;
        let root_id = root.id.clone();

        store.create(family, root).await.unwrap();

        // Stale version is refused
        let err = store.remove(&family_id, 7).await.unwrap_err();
        assert!(matches!(err, ApiError::ConflictRetry));

        store.remove(&family_id, 0).await.unwrap();
        assert!(store.load(&family_id).await.unwrap().is_none());
        assert_eq!(store.find_family_of(&root_id).await.unwrap(), None);

        // Removing an already-removed family is a no-op
        store.remove(&family_id, 0).await.unwrap();
    }
}
