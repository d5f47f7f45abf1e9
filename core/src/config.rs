//! Configuration and policy knobs

use crate::error::{ApiError, Result};
use crate::platform::Environment;

/// Default refresh token lifetime (30 days)
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 30 * 24 * 3600;

/// Default access token lifetime (15 minutes)
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 900;

/// Default retention window for dormant revoked/expired families (14 days)
pub const DEFAULT_RETENTION_SECS: u64 = 14 * 24 * 3600;

/// Upper bound on internal conflict retries per operation.
///
/// Each retry re-reads family state, and a lost race always resolves to a
/// terminal outcome on the next read, so this bound is never hit in
/// practice; it exists to keep the retry loop total.
pub const DEFAULT_MAX_APPLY_ATTEMPTS: u32 = 8;

/// How a requested scope wider than the original grant is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePolicy {
    /// Reject the exchange with `ScopeExceeded`
    Strict,
    /// Grant the intersection of requested and original scope
    Downgrade,
}

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Lifetime of each refresh token, measured from its own issuance
    pub refresh_ttl_secs: u64,
    /// Lifetime of issued access tokens
    pub access_ttl_secs: u64,
    /// How long revoked or expired families are kept for the audit trail
    /// before the retention sweep deletes them
    pub retention_secs: u64,
    /// Scope-narrowing policy for `Exchange`
    pub scope_policy: ScopePolicy,
    /// Bound on internal conflict retries
    pub max_apply_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            retention_secs: DEFAULT_RETENTION_SECS,
            scope_policy: ScopePolicy::Strict,
            max_apply_attempts: DEFAULT_MAX_APPLY_ATTEMPTS,
        }
    }
}

impl Config {
    /// Load configuration from platform environment, falling back to
    /// defaults for unset variables
    pub fn from_env(env: &dyn Environment) -> Result<Self> {
        Ok(Self {
            refresh_ttl_secs: secs_var(env, "KEYTURN_REFRESH_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?,
            access_ttl_secs: secs_var(env, "KEYTURN_ACCESS_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?,
            retention_secs: secs_var(env, "KEYTURN_RETENTION_SECS", DEFAULT_RETENTION_SECS)?,
            scope_policy: match env.get_var("KEYTURN_SCOPE_POLICY").ok().as_deref() {
                None | Some("strict") => ScopePolicy::Strict,
                Some("downgrade") => ScopePolicy::Downgrade,
                Some(other) => {
                    return Err(ApiError::internal(format!(
                        "KEYTURN_SCOPE_POLICY must be 'strict' or 'downgrade', got '{}'",
                        other
                    )))
                }
            },
            max_apply_attempts: DEFAULT_MAX_APPLY_ATTEMPTS,
        })
    }
}

fn secs_var(env: &dyn Environment, name: &str, default: u64) -> Result<u64> {
    match env.get_var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ApiError::internal(format!("{} must be an integer, got '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}
