//! Core audit types
//!
//! Records are built by the host per operation; whitelists are owned by
//! the store and shared read-only through the cache.

use crate::error::{AuditError, Result};
use crate::resource::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Opaque principal identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Operation permission vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    Create,
    Alter,
    Drop,
    Select,
    Modify,
    Authorize,
    Describe,
    Execute,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::Create,
        Permission::Alter,
        Permission::Drop,
        Permission::Select,
        Permission::Modify,
        Permission::Authorize,
        Permission::Describe,
        Permission::Execute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Create => "CREATE",
            Permission::Alter => "ALTER",
            Permission::Drop => "DROP",
            Permission::Select => "SELECT",
            Permission::Modify => "MODIFY",
            Permission::Authorize => "AUTHORIZE",
            Permission::Describe => "DESCRIBE",
            Permission::Execute => "EXECUTE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AuditError::Config(format!("Unknown permission: {}", s)))
    }
}

/// Outcome of the audited operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Operation was attempted (logged before execution)
    #[default]
    Attempt,
    /// Operation failed
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Attempt => f.write_str("ATTEMPT"),
            Status::Failed => f.write_str("FAILED"),
        }
    }
}

/// A role's directly assigned exemptions: resource → permissions
///
/// Entries only ever add exemptions; there is no negative entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Whitelist {
    entries: HashMap<ResourceId, BTreeSet<Permission>>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`Whitelist::grant`]
    pub fn with(
        mut self,
        resource: ResourceId,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        self.grant(resource, permissions);
        self
    }

    /// Add permissions to the entry for `resource`
    pub fn grant(
        &mut self,
        resource: ResourceId,
        permissions: impl IntoIterator<Item = Permission>,
    ) {
        self.entries.entry(resource).or_default().extend(permissions);
    }

    /// Remove permissions from the entry for `resource`, dropping it when empty
    pub fn revoke(&mut self, resource: &ResourceId, permissions: &[Permission]) {
        if let Some(granted) = self.entries.get_mut(resource) {
            for p in permissions {
                granted.remove(p);
            }
            if granted.is_empty() {
                self.entries.remove(resource);
            }
        }
    }

    /// Exact lookup on one resource, no hierarchy walk
    pub fn permits(&self, resource: &ResourceId, permission: Permission) -> bool {
        self.entries
            .get(resource)
            .is_some_and(|granted| granted.contains(&permission))
    }

    pub fn permissions(&self, resource: &ResourceId) -> Option<&BTreeSet<Permission>> {
        self.entries.get(resource)
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One audited client operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Authenticated user issuing the operation
    pub user: RoleId,

    /// Address of the client connection
    pub client_address: IpAddr,

    /// Resource the operation targets
    pub resource: ResourceId,

    /// Permissions the operation requires (never empty)
    permissions: BTreeSet<Permission>,

    pub status: Status,

    /// Operation description, typically the statement text
    pub operation: String,

    /// Set when the operation is part of a batch
    pub batch_id: Option<uuid::Uuid>,

    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

impl AuditRecord {
    /// Create an `ATTEMPT` record stamped with the current time
    pub fn new(
        user: impl Into<RoleId>,
        client_address: IpAddr,
        resource: ResourceId,
        permissions: impl IntoIterator<Item = Permission>,
        operation: impl Into<String>,
    ) -> Result<Self> {
        let permissions: BTreeSet<Permission> = permissions.into_iter().collect();
        if permissions.is_empty() {
            return Err(AuditError::InvalidRecord(
                "at least one permission is required".to_string(),
            ));
        }
        Ok(Self {
            user: user.into(),
            client_address,
            resource,
            permissions,
            status: Status::Attempt,
            operation: operation.into(),
            batch_id: None,
            timestamp: now_millis(),
        })
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_batch_id(mut self, batch_id: uuid::Uuid) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
