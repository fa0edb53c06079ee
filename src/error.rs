//! Error types for a3s-audit

use thiserror::Error;

/// Errors that can occur while filtering or rendering audit records
#[derive(Debug, Error)]
pub enum AuditError {
    /// Log format references a field that does not exist
    #[error("Unknown log format field: {0}")]
    UnknownField(String),

    /// Timestamp pattern could not be parsed
    #[error("Invalid time format '{pattern}': {reason}")]
    InvalidTimeFormat {
        pattern: String,
        reason: String,
    },

    /// Time zone id could not be resolved
    #[error("Invalid time zone: {0}")]
    InvalidTimeZone(String),

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Role hierarchy lookup failure
    #[error("Failed to resolve roles of '{role}': {reason}")]
    RoleHierarchy {
        role: String,
        reason: String,
    },

    /// Whitelist store failure (load or setup)
    #[error("Whitelist store error: {0}")]
    Store(String),

    /// Resource path without any segment
    #[error("Invalid resource path: '{0}'")]
    InvalidResource(String),

    /// Audit record violates an invariant
    #[error("Invalid audit record: {0}")]
    InvalidRecord(String),

    /// Log sink rejected a rendered line
    #[error("Sink error: {0}")]
    Sink(String),

    /// JSON serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse failure
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuditError {
    /// Errors raised while building the filter or logger from configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuditError::UnknownField(_)
                | AuditError::InvalidTimeFormat { .. }
                | AuditError::InvalidTimeZone(_)
                | AuditError::Config(_)
                | AuditError::Yaml(_)
        )
    }

    /// Errors raised while looking up roles or whitelists for a decision
    pub fn is_lookup(&self) -> bool {
        matches!(self, AuditError::RoleHierarchy { .. } | AuditError::Store(_))
    }

    /// Rebuild an owned error from one shared between coalesced cache waiters
    pub(crate) fn from_shared(err: &AuditError) -> Self {
        match err {
            AuditError::RoleHierarchy { role, reason } => AuditError::RoleHierarchy {
                role: role.clone(),
                reason: reason.clone(),
            },
            AuditError::Store(reason) => AuditError::Store(reason.clone()),
            other => AuditError::Store(other.to_string()),
        }
    }
}

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
