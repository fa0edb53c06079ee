//! Audit configuration
//!
//! Loaded once from YAML at startup. Everything that can be validated is
//! validated when the filter and logger are built, so a bad format string
//! or time zone stops the process before the first record is seen.
//!
//! ```yaml
//! filter_type: yaml_and_role
//! whitelist:
//!   - cassandra
//! logger:
//!   log_format: "${TIMESTAMP} ${USER}@${CLIENT}: ${OPERATION}"
//!   time_format: "%Y-%m-%d %H:%M:%S%.3f"
//!   time_zone: UTC
//! whitelist_cache:
//!   max_capacity: 1000
//!   time_to_live_millis: 120000
//! ```

use crate::cache::WhitelistCache;
use crate::error::{AuditError, Result};
use crate::filter::{
    AuditFilter, FilterChain, NoAuditFilter, RoleAuditFilter, UsernameAuditFilter,
};
use crate::provider::RoleHierarchy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Format used when no `log_format` is configured
pub const DEFAULT_LOG_FORMAT: &str = "client:'${CLIENT}'|user:'${USER}'{?|batchId:'${BATCH_ID}'?}|status:'${STATUS}'|operation:'${OPERATION}'";

/// Top-level audit configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Usernames exempt from auditing by the static filter
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Which filters decide suppression
    #[serde(default)]
    pub filter_type: FilterType,

    /// Also accepted under the `slf4j` key
    #[serde(default, alias = "slf4j")]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub whitelist_cache: CacheConfig,
}

/// Filter selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Audit everything
    None,
    /// Static username list only
    Yaml,
    /// Role-based whitelists only
    #[default]
    Role,
    /// Suppress when either filter matches
    YamlAndRole,
}

/// Log template settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// strftime-style pattern applied to `${TIMESTAMP}`; raw millis when unset
    #[serde(default)]
    pub time_format: Option<String>,

    /// `UTC`, `local`, a fixed offset such as `+02:00` or a region such as
    /// `Europe/Stockholm`; system local when unset
    #[serde(default)]
    pub time_zone: Option<String>,
}

fn default_log_format() -> String {
    DEFAULT_LOG_FORMAT.to_string()
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            time_format: None,
            time_zone: None,
        }
    }
}

/// Whitelist cache bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of resident roles
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,

    /// Evict entries this long after they were loaded
    #[serde(default)]
    pub time_to_live_millis: Option<u64>,

    /// Evict entries this long after their last access
    #[serde(default)]
    pub time_to_idle_millis: Option<u64>,
}

fn default_max_capacity() -> u64 {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            time_to_live_millis: None,
            time_to_idle_millis: None,
        }
    }
}

impl CacheConfig {
    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live_millis.map(Duration::from_millis)
    }

    pub fn time_to_idle(&self) -> Option<Duration> {
        self.time_to_idle_millis.map(Duration::from_millis)
    }
}

impl AuditConfig {
    /// Parse configuration from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AuditConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when the file is absent
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No audit config file, using defaults");
            return Ok(Self::default());
        }

        let yaml = std::fs::read_to_string(path).map_err(|e| {
            AuditError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_yaml_str(&yaml)?;
        tracing::info!(
            path = %path.display(),
            filter_type = ?config.filter_type,
            whitelisted_users = config.whitelist.len(),
            "Audit config loaded"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.whitelist_cache.max_capacity == 0 {
            return Err(AuditError::Config(
                "whitelist_cache.max_capacity must be >= 1".to_string(),
            ));
        }
        if self.logger.log_format.is_empty() {
            return Err(AuditError::Config("logger.log_format cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Assemble the configured filter
    ///
    /// `roles` and `cache` are only consulted for the role-based variants.
    pub fn build_filter(
        &self,
        roles: Arc<dyn RoleHierarchy>,
        cache: Arc<WhitelistCache>,
    ) -> Arc<dyn AuditFilter> {
        match self.filter_type {
            FilterType::None => Arc::new(NoAuditFilter),
            FilterType::Yaml => Arc::new(UsernameAuditFilter::new(self.whitelist.iter().cloned())),
            FilterType::Role => Arc::new(RoleAuditFilter::new(roles, cache)),
            FilterType::YamlAndRole => Arc::new(FilterChain::new(vec![
                Arc::new(UsernameAuditFilter::new(self.whitelist.iter().cloned())),
                Arc::new(RoleAuditFilter::new(roles, cache)),
            ])),
        }
    }
}
