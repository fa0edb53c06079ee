use super::AuditFilter;
use crate::error::Result;
use crate::types::AuditRecord;
use async_trait::async_trait;
use std::collections::HashSet;

/// Static username whitelist from configuration
///
/// Exempts every operation of the listed users regardless of resource or
/// permission. Role grants are not consulted.
#[derive(Debug, Clone, Default)]
pub struct UsernameAuditFilter {
    users: HashSet<String>,
}

impl UsernameAuditFilter {
    pub fn new(users: impl IntoIterator<Item = String>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }

    pub fn contains(&self, user: &str) -> bool {
        self.users.contains(user)
    }
}

#[async_trait]
impl AuditFilter for UsernameAuditFilter {
    async fn setup(&self) -> Result<()> {
        tracing::info!(users = self.users.len(), "Username audit whitelist active");
        Ok(())
    }

    async fn is_filtered(&self, record: &AuditRecord) -> Result<bool> {
        Ok(self.users.contains(record.user.as_str()))
    }
}
