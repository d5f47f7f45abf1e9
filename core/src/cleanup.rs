//! Retention sweep
//!
//! Garbage-collects families that can never be exchanged again: revoked
//! families, and families whose head token has expired. Records stay
//! around for `retention_secs` after their last activity so the audit
//! trail can still be correlated, then the sweep deletes them.

use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::platform::{Clock, Store};
use crate::token::FamilySnapshot;

/// Outcome of one sweep pass
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub examined: usize,
    pub removed: usize,
}

/// Delete families that are dead and past the retention window.
///
/// A family racing with concurrent exchanges is simply skipped this pass;
/// the next pass re-reads it.
pub async fn sweep(store: &dyn Store, clock: &dyn Clock, config: &Config) -> Result<SweepStats> {
    let mut stats = SweepStats::default();
    let now = clock.now();
    let retention = crate::token::saturating_secs(config.retention_secs);

    for family_id in store.list_families().await? {
        let Some(snapshot) = store.load(&family_id).await? else {
            continue;
        };
        stats.examined += 1;

        if !is_dead(&snapshot, now) {
            continue;
        }
        if now - snapshot.family.last_used_at < retention {
            continue;
        }

        match store.remove(&family_id, snapshot.version).await {
            Ok(()) => stats.removed += 1,
            Err(ApiError::ConflictRetry) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(stats)
}

/// A family is dead when no exchange can ever succeed on it again
fn is_dead(snapshot: &FamilySnapshot, now: chrono::DateTime<chrono::Utc>) -> bool {
    if snapshot.family.revoked {
        return true;
    }
    match snapshot.head() {
        Some(head) => head.is_expired(now),
        None => true,
    }
}
