//! Hierarchical resource identifiers
//!
//! Resources are slash-separated paths rooted at a scope name, e.g.
//! `data` → `data/ks` → `data/ks/tbl`. A whitelist entry on any element of
//! the chain covers everything below it.

use crate::error::AuditError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expected chain length for the common `data/<keyspace>/<table>` shape
const TYPICAL_DEPTH: usize = 3;

const SEPARATOR: char = '/';

/// Identifier of a securable object
///
/// Deserialised values go through [`ResourceId::parse`], so stored paths
/// compare equal to the ones built in code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Parse a resource path, normalising redundant separators
    ///
    /// Returns `None` for paths without any segment.
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path
            .split(SEPARATOR)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return None;
        }
        Some(Self(segments.join("/")))
    }

    /// Root of all data resources
    pub fn data() -> Self {
        Self("data".to_string())
    }

    /// A keyspace under the data root
    pub fn keyspace(keyspace: &str) -> Self {
        Self(format!("data/{}", keyspace))
    }

    /// A table inside a keyspace
    pub fn table(keyspace: &str, table: &str) -> Self {
        Self(format!("data/{}/{}", keyspace, table))
    }

    /// Root of all role resources
    pub fn roles() -> Self {
        Self("roles".to_string())
    }

    /// A single role resource
    pub fn role(name: &str) -> Self {
        Self(format!("roles/{}", name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_parent(&self) -> bool {
        self.0.contains(SEPARATOR)
    }

    /// The enclosing scope, or `None` at a root
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(parent, _)| Self(parent.to_string()))
    }

    /// This resource followed by every ancestor up to the root
    pub fn ancestor_chain(&self) -> Vec<ResourceId> {
        let mut chain = Vec::with_capacity(TYPICAL_DEPTH);
        chain.push(self.clone());
        let mut current = self.parent();
        while let Some(resource) = current {
            current = resource.parent();
            chain.push(resource);
        }
        chain
    }

    /// Whether `self` is `other` or lies below it
    pub fn is_within(&self, other: &ResourceId) -> bool {
        self == other
            || (self.0.starts_with(other.as_str())
                && self.0[other.0.len()..].starts_with(SEPARATOR))
    }
}

impl TryFrom<String> for ResourceId {
    type Error = AuditError;

    fn try_from(path: String) -> Result<Self, Self::Error> {
        Self::parse(&path).ok_or_else(|| AuditError::InvalidResource(path))
    }
}

impl From<ResourceId> for String {
    fn from(resource: ResourceId) -> Self {
        resource.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
