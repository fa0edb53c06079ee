use super::AuditFilter;
use crate::cache::WhitelistCache;
use crate::error::Result;
use crate::provider::RoleHierarchy;
use crate::resource::ResourceId;
use crate::types::{AuditRecord, Permission, RoleId, Whitelist};
use async_trait::async_trait;
use std::sync::Arc;

/// Role-based whitelist filter
///
/// A record is suppressed when, for every permission it requires, some
/// role in the user's closure has whitelisted that permission on the
/// record's resource or one of its ancestors. Different permissions may
/// be covered by different roles.
pub struct RoleAuditFilter {
    roles: Arc<dyn RoleHierarchy>,
    cache: Arc<WhitelistCache>,
}

impl RoleAuditFilter {
    pub fn new(roles: Arc<dyn RoleHierarchy>, cache: Arc<WhitelistCache>) -> Self {
        Self { roles, cache }
    }

    pub fn cache(&self) -> &WhitelistCache {
        &self.cache
    }

    /// Returns `true` when the record is whitelisted and must not be logged
    ///
    /// Role or whitelist lookup failures abort the decision with an error.
    pub async fn decide(&self, record: &AuditRecord) -> Result<bool> {
        let closure = self.roles.roles_of(&record.user).await.map_err(|e| {
            tracing::warn!(user = %record.user, error = %e, "Role lookup failed");
            e
        })?;
        let roles = self.cached_first(closure);
        let hierarchy = record.resource.ancestor_chain();

        // Each role's whitelist is fetched at most once per decision
        let mut whitelists: Vec<Option<Arc<Whitelist>>> = vec![None; roles.len()];

        for &permission in record.permissions() {
            if !self
                .is_whitelisted(permission, &hierarchy, &roles, &mut whitelists)
                .await?
            {
                tracing::trace!(
                    user = %record.user,
                    resource = %record.resource,
                    permission = %permission,
                    "Not whitelisted"
                );
                return Ok(false);
            }
        }

        tracing::trace!(
            user = %record.user,
            resource = %record.resource,
            "Whitelisted, record suppressed"
        );
        Ok(true)
    }

    async fn is_whitelisted(
        &self,
        permission: Permission,
        hierarchy: &[ResourceId],
        roles: &[RoleId],
        whitelists: &mut [Option<Arc<Whitelist>>],
    ) -> Result<bool> {
        for (role, slot) in roles.iter().zip(whitelists.iter_mut()) {
            let whitelist = match slot.take() {
                Some(whitelist) => whitelist,
                None => self.cache.get(role).await?,
            };
            let covered = hierarchy
                .iter()
                .any(|resource| whitelist.permits(resource, permission));
            *slot = Some(whitelist);
            if covered {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Resident roles first so a hit needs no store round-trip
    fn cached_first(&self, closure: impl IntoIterator<Item = RoleId>) -> Vec<RoleId> {
        let (mut cached, uncached): (Vec<RoleId>, Vec<RoleId>) = closure
            .into_iter()
            .partition(|role| self.cache.is_cached(role));
        cached.extend(uncached);
        cached
    }
}

#[async_trait]
impl AuditFilter for RoleAuditFilter {
    async fn setup(&self) -> Result<()> {
        self.cache.setup().await?;
        tracing::info!(store = self.cache.store().name(), "Role audit filter ready");
        Ok(())
    }

    async fn is_filtered(&self, record: &AuditRecord) -> Result<bool> {
        self.decide(record).await
    }
}
