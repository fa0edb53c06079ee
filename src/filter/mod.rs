//! Audit filters: decide whether a record is exempt from the audit trail
//!
//! A filter answers one question per record: suppress it or not. Lookup
//! failures are returned as errors rather than folded into either answer;
//! the host decides what a failed decision means for the operation.

use crate::error::Result;
use crate::types::AuditRecord;
use async_trait::async_trait;
use std::sync::Arc;

mod role;
mod username;

pub use role::RoleAuditFilter;
pub use username::UsernameAuditFilter;

/// Whitelist decision for audit records
#[async_trait]
pub trait AuditFilter: Send + Sync {
    /// One-time bootstrap, called before the first record
    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    /// Returns `true` when `record` must not be logged
    async fn is_filtered(&self, record: &AuditRecord) -> Result<bool>;
}

/// Filter that never suppresses anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuditFilter;

#[async_trait]
impl AuditFilter for NoAuditFilter {
    async fn is_filtered(&self, _record: &AuditRecord) -> Result<bool> {
        Ok(false)
    }
}

/// Suppresses a record when any member filter suppresses it
///
/// Members are consulted in order and the first match wins, so cheap
/// filters should come first. An error from a member aborts the chain.
pub struct FilterChain {
    filters: Vec<Arc<dyn AuditFilter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn AuditFilter>>) -> Self {
        Self { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[async_trait]
impl AuditFilter for FilterChain {
    async fn setup(&self) -> Result<()> {
        for filter in &self.filters {
            filter.setup().await?;
        }
        Ok(())
    }

    async fn is_filtered(&self, record: &AuditRecord) -> Result<bool> {
        for filter in &self.filters {
            if filter.is_filtered(record).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
