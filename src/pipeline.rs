//! High-level audit pipeline built on pluggable filters and loggers
//!
//! `AuditPipeline` is what the query path calls once per operation:
//! filter first, then render and append when the record is not exempt.

use crate::cache::WhitelistCache;
use crate::config::AuditConfig;
use crate::error::Result;
use crate::filter::AuditFilter;
use crate::logger::{AuditLogger, TemplateLogger};
use crate::provider::RoleHierarchy;
use crate::sink::LogSink;
use crate::types::AuditRecord;
use std::sync::Arc;

/// Filter + logger pair applied to every audited operation
#[derive(Clone)]
pub struct AuditPipeline {
    filter: Arc<dyn AuditFilter>,
    logger: Arc<dyn AuditLogger>,
}

impl AuditPipeline {
    pub fn new(filter: Arc<dyn AuditFilter>, logger: Arc<dyn AuditLogger>) -> Self {
        Self { filter, logger }
    }

    /// Build the configured filter and template logger
    ///
    /// Configuration errors surface here, before any record is processed.
    /// The cache is passed in so the host keeps a handle for invalidation.
    pub fn from_config(
        config: &AuditConfig,
        roles: Arc<dyn RoleHierarchy>,
        cache: Arc<WhitelistCache>,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self> {
        let logger = TemplateLogger::from_config(&config.logger, sink)?;
        let filter = config.build_filter(roles, cache);
        Ok(Self::new(filter, Arc::new(logger)))
    }

    /// Bootstrap the filter's backends; call once at startup
    pub async fn setup(&self) -> Result<()> {
        self.filter.setup().await
    }

    /// Audit one operation, returning whether a line was written
    ///
    /// Filter errors are returned without logging anything; the caller
    /// decides whether the operation proceeds.
    pub async fn audit(&self, record: &AuditRecord) -> Result<bool> {
        if self.filter.is_filtered(record).await? {
            return Ok(false);
        }
        self.logger.log(record)?;
        Ok(true)
    }

    pub fn filter(&self) -> &dyn AuditFilter {
        self.filter.as_ref()
    }
}
