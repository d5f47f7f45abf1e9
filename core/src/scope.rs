//! Scope sets
//!
//! Parsing and narrowing of space-separated OAuth2 scope strings.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An unordered set of scope strings.
///
/// Stored sorted so `to_string` output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Parse a space-separated scope string. Empty input yields an empty set.
    pub fn parse(raw: &str) -> Self {
        Self(raw.split_whitespace().map(str::to_string).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// True if every scope in `self` is also granted by `other`
    pub fn is_subset_of(&self, other: &ScopeSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Scopes present in both sets
    pub fn intersection(&self, other: &ScopeSet) -> ScopeSet {
        Self(self.0.intersection(&other.0).cloned().collect())
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(scope)?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<String> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_whitespace() {
        let scopes = ScopeSet::parse("openid  profile\temail");
        assert_eq!(scopes.len(), 3);
        assert!(scopes.contains("openid"));
        assert!(scopes.contains("profile"));
        assert!(scopes.contains("email"));
    }

    #[test]
    fn test_parse_deduplicates() {
        let scopes = ScopeSet::parse("read read write");
        assert_eq!(scopes.len(), 2);
    }

    #[test]
    fn test_empty_scope() {
        let scopes = ScopeSet::parse("");
        assert!(scopes.is_empty());
        assert_eq!(scopes.to_string(), "");
    }

    #[test]
    fn test_subset() {
        let granted = ScopeSet::parse("openid profile email");
        let requested = ScopeSet::parse("openid email");
        let widened = ScopeSet::parse("openid admin");

        assert!(requested.is_subset_of(&granted));
        assert!(!widened.is_subset_of(&granted));
    }

    #[test]
    fn test_intersection() {
        let granted = ScopeSet::parse("openid profile email");
        let requested = ScopeSet::parse("email admin");
        let narrowed = requested.intersection(&granted);
        assert_eq!(narrowed.to_string(), "email");
    }

    #[test]
    fn test_display_is_sorted_and_stable() {
        let scopes = ScopeSet::parse("write read openid");
        assert_eq!(scopes.to_string(), "openid read write");
    }
}
