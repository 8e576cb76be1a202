//! Scope sets.
//!
//! Scopes travel on the wire as a single space-delimited string
//! (RFC 6749 section 3.3). Internally they are an ordered set so that
//! comparisons ignore ordering and duplicates, and so that rendering is
//! stable.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A set of OAuth scope values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Creates an empty scope set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a space-delimited scope string.
    #[must_use]
    pub fn parse(scope: &str) -> Self {
        Self(scope.split_whitespace().map(str::to_string).collect())
    }

    /// Returns `true` if the set contains `scope`.
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Returns `true` if every scope in `self` is also in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &ScopeSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Returns the scopes of `self` that are not in `other`.
    #[must_use]
    pub fn difference<'a>(&'a self, other: &'a ScopeSet) -> Vec<&'a str> {
        self.0.difference(&other.0).map(String::as_str).collect()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of scopes in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the scopes in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Renders the wire form.
    #[must_use]
    pub fn to_scope_string(&self) -> String {
        self.0.iter().cloned().collect::<Vec<_>>().join(" ")
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_scope_string())
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        )
    }
}

impl Serialize for ScopeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_scope_string())
    }
}

impl<'de> Deserialize<'de> for ScopeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignores_order_and_duplicates() {
        let a = ScopeSet::parse("openid profile  openid");
        let b = ScopeSet::parse("profile openid");
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.to_scope_string(), "openid profile");
    }

    #[test]
    fn test_subset() {
        let allowed = ScopeSet::parse("openid profile");
        assert!(ScopeSet::parse("openid").is_subset(&allowed));
        assert!(ScopeSet::new().is_subset(&allowed));
        assert!(!ScopeSet::parse("openid email").is_subset(&allowed));
        assert_eq!(
            ScopeSet::parse("openid email").difference(&allowed),
            vec!["email"]
        );
    }

    #[test]
    fn test_serde_uses_space_delimited_string() {
        let scopes: ScopeSet = ["read", "write"].into_iter().collect();
        let json = serde_json::to_string(&scopes).unwrap();
        assert_eq!(json, "\"read write\"");

        let back: ScopeSet = serde_json::from_str("\"write read\"").unwrap();
        assert_eq!(back, scopes);
    }
}
