//! In-memory collaborators for tests and single-process deployments

use super::{RoleHierarchy, WhitelistStore};
use crate::error::{AuditError, Result};
use crate::resource::ResourceId;
use crate::types::{Permission, RoleId, Whitelist};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Role graph held in memory
///
/// Stores direct grants only; `roles_of` computes the transitive closure
/// with a visited set, so cyclic grants terminate.
#[derive(Default)]
pub struct StaticRoleHierarchy {
    grants: RwLock<HashMap<RoleId, HashSet<RoleId>>>,
}

impl StaticRoleHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `granted` to `grantee`
    pub fn grant(&self, grantee: impl Into<RoleId>, granted: impl Into<RoleId>) -> Result<()> {
        let mut grants = self.grants.write().map_err(|e| lock_error(&e))?;
        grants
            .entry(grantee.into())
            .or_default()
            .insert(granted.into());
        Ok(())
    }

    /// Revoke a direct grant; returns whether it existed
    pub fn revoke(&self, grantee: &RoleId, granted: &RoleId) -> Result<bool> {
        let mut grants = self.grants.write().map_err(|e| lock_error(&e))?;
        Ok(grants
            .get_mut(grantee)
            .map(|set| set.remove(granted))
            .unwrap_or(false))
    }
}

#[async_trait]
impl RoleHierarchy for StaticRoleHierarchy {
    async fn roles_of(&self, role: &RoleId) -> Result<HashSet<RoleId>> {
        let grants = self.grants.read().map_err(|e| AuditError::RoleHierarchy {
            role: role.to_string(),
            reason: format!("role graph lock poisoned: {}", e),
        })?;

        let mut closure = HashSet::new();
        let mut queue = VecDeque::from([role.clone()]);
        while let Some(current) = queue.pop_front() {
            if !closure.insert(current.clone()) {
                continue;
            }
            if let Some(direct) = grants.get(&current) {
                queue.extend(direct.iter().filter(|r| !closure.contains(*r)).cloned());
            }
        }
        Ok(closure)
    }
}

fn lock_error<E: std::fmt::Display>(e: &E) -> AuditError {
    AuditError::Config(format!("role graph lock poisoned: {}", e))
}

/// Whitelist store held in memory
///
/// Counts `load` calls so callers can observe cache effectiveness.
#[derive(Default)]
pub struct MemoryWhitelistStore {
    whitelists: RwLock<HashMap<RoleId, Whitelist>>,
    loads: AtomicUsize,
}

impl MemoryWhitelistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitelist `permissions` on `resource` for `role`
    pub fn grant(
        &self,
        role: impl Into<RoleId>,
        resource: ResourceId,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Result<()> {
        let mut whitelists = self.whitelists.write().map_err(|e| store_lock_error(&e))?;
        whitelists
            .entry(role.into())
            .or_default()
            .grant(resource, permissions);
        Ok(())
    }

    /// Remove `permissions` on `resource` from the whitelist of `role`
    pub fn revoke(
        &self,
        role: &RoleId,
        resource: &ResourceId,
        permissions: &[Permission],
    ) -> Result<()> {
        let mut whitelists = self.whitelists.write().map_err(|e| store_lock_error(&e))?;
        if let Some(whitelist) = whitelists.get_mut(role) {
            whitelist.revoke(resource, permissions);
        }
        Ok(())
    }

    /// Drop the whole whitelist of `role`
    pub fn remove_role(&self, role: &RoleId) -> Result<()> {
        let mut whitelists = self.whitelists.write().map_err(|e| store_lock_error(&e))?;
        whitelists.remove(role);
        Ok(())
    }

    /// Number of `load` calls served so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WhitelistStore for MemoryWhitelistStore {
    async fn load(&self, role: &RoleId) -> Result<Whitelist> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let whitelists = self.whitelists.read().map_err(|e| store_lock_error(&e))?;
        Ok(whitelists.get(role).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn store_lock_error<E: std::fmt::Display>(e: &E) -> AuditError {
    AuditError::Store(format!("whitelist lock poisoned: {}", e))
}
