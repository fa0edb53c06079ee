//! Collaborator traits: role hierarchy and whitelist storage backends
//!
//! The decision engine never talks to a database directly. Hosts plug in
//! their role graph and whitelist persistence by implementing these
//! traits; `memory` and `file` provide reference backends.

use crate::error::Result;
use crate::types::{RoleId, Whitelist};
use async_trait::async_trait;
use std::collections::HashSet;

pub mod file;
pub mod memory;

/// Resolves a role to the closure of roles granted to it
///
/// The returned set is finite, de-duplicated and always contains the
/// queried role itself. Lookup failures must be reported as
/// [`AuditError::RoleHierarchy`](crate::AuditError::RoleHierarchy).
#[async_trait]
pub trait RoleHierarchy: Send + Sync {
    async fn roles_of(&self, role: &RoleId) -> Result<HashSet<RoleId>>;
}

/// Persistent source of per-role whitelists
#[async_trait]
pub trait WhitelistStore: Send + Sync {
    /// Idempotent bootstrap (schema creation, default files, ...)
    ///
    /// Called once at startup before the first `load`.
    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    /// Load the whitelist directly assigned to `role`
    ///
    /// Roles without any entry yield an empty whitelist, never an error.
    async fn load(&self, role: &RoleId) -> Result<Whitelist>;

    /// Backend name (e.g., "memory", "file")
    fn name(&self) -> &str;
}
