//! # a3s-audit
//!
//! Role-based audit whitelisting and templated audit log rendering.
//!
//! ## Overview
//!
//! Every client operation against the database passes through an
//! [`AuditPipeline`]: a filter decides whether the operation is exempt from
//! the audit trail, and records that are not exempt are rendered through a
//! compiled log template and appended to a [`LogSink`].
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_audit::{
//!     AuditConfig, AuditPipeline, AuditRecord, MemorySink, MemoryWhitelistStore, Permission,
//!     ResourceId, StaticRoleHierarchy, WhitelistCache,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> a3s_audit::Result<()> {
//! let config = AuditConfig::default();
//! let roles = Arc::new(StaticRoleHierarchy::new());
//! let store = Arc::new(MemoryWhitelistStore::new());
//! let cache = Arc::new(WhitelistCache::new(store.clone(), &config.whitelist_cache));
//! let sink = Arc::new(MemorySink::new());
//!
//! // Exempt the "metrics" role from auditing reads in the "stats" keyspace
//! roles.grant("collector", "metrics")?;
//! store.grant("metrics", ResourceId::keyspace("stats"), [Permission::Select])?;
//!
//! let pipeline = AuditPipeline::from_config(&config, roles, cache, sink.clone())?;
//! pipeline.setup().await?;
//!
//! let record = AuditRecord::new(
//!     "collector",
//!     "10.0.0.7".parse().unwrap(),
//!     ResourceId::table("stats", "daily"),
//!     [Permission::Select],
//!     "SELECT * FROM stats.daily",
//! )?;
//! assert!(!pipeline.audit(&record).await?);
//! assert!(sink.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **RoleHierarchy** / **WhitelistStore** traits: host-provided role graph and
//!   whitelist persistence
//! - **WhitelistCache**: per-role, single-flight cache in front of the store
//! - **RoleAuditFilter**: the whitelist decision engine
//! - **CompiledTemplate** / **TemplateLogger**: format string compiled once,
//!   rendered per record
//! - **AuditPipeline**: filter then log, once per operation

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod logger;
pub mod pipeline;
pub mod provider;
pub mod resource;
pub mod sink;
pub mod template;
pub mod timestamp;
pub mod types;

// Re-export core types
pub use cache::WhitelistCache;
pub use config::{AuditConfig, CacheConfig, FilterType, LoggerConfig, DEFAULT_LOG_FORMAT};
pub use error::{AuditError, Result};
pub use filter::{AuditFilter, FilterChain, NoAuditFilter, RoleAuditFilter, UsernameAuditFilter};
pub use logger::{AuditLogger, TemplateLogger};
pub use pipeline::AuditPipeline;
pub use provider::{RoleHierarchy, WhitelistStore};
pub use resource::ResourceId;
pub use sink::{LogSink, MemorySink, TracingSink};
pub use template::{lex, CompiledTemplate, FieldRegistry, Instruction};
pub use timestamp::{TimestampFormat, Zone};
pub use types::{AuditRecord, Permission, RoleId, Status, Whitelist};

// Re-export reference backends for convenience
pub use provider::file::FileWhitelistStore;
pub use provider::memory::{MemoryWhitelistStore, StaticRoleHierarchy};
