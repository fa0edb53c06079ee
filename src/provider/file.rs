//! JSON file whitelist store
//!
//! Persists all role whitelists in a single JSON document:
//!
//! ```json
//! { "svc": { "data/ks": ["SELECT", "MODIFY"] } }
//! ```
//!
//! Every `load` reads the file, so callers should always go through the
//! [`WhitelistCache`](crate::WhitelistCache).

use super::WhitelistStore;
use crate::error::{AuditError, Result};
use crate::resource::ResourceId;
use crate::types::{Permission, RoleId, Whitelist};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File-backed whitelist store
///
/// Writes are atomic (temp file + rename) and serialised through an
/// internal mutex; reads never take the mutex.
pub struct FileWhitelistStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileWhitelistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whitelist `permissions` on `resource` for `role` and persist
    pub async fn grant(
        &self,
        role: impl Into<RoleId>,
        resource: ResourceId,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        all.entry(role.into()).or_default().grant(resource, permissions);
        self.write_all(&all).await
    }

    /// Replace the whole whitelist of `role` and persist
    pub async fn save_role(&self, role: impl Into<RoleId>, whitelist: Whitelist) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        let role = role.into();
        if whitelist.is_empty() {
            all.remove(&role);
        } else {
            all.insert(role, whitelist);
        }
        self.write_all(&all).await
    }

    async fn read_all(&self) -> Result<HashMap<RoleId, Whitelist>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(AuditError::Store(format!(
                    "Failed to read whitelist file {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if json.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&json).map_err(|e| {
            AuditError::Store(format!(
                "Failed to parse whitelist file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn write_all(&self, whitelists: &HashMap<RoleId, Whitelist>) -> Result<()> {
        let json = serde_json::to_string_pretty(whitelists)?;

        // Atomic write: write to temp file, then rename
        let tmp_path = self.path.with_extension("tmp");

        self.ensure_parent().await?;

        tokio::fs::write(&tmp_path, json).await.map_err(|e| {
            AuditError::Store(format!(
                "Failed to write whitelist file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            AuditError::Store(format!(
                "Failed to rename whitelist file {} → {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), roles = whitelists.len(), "Whitelists saved");
        Ok(())
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AuditError::Store(format!(
                    "Failed to create whitelist directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl WhitelistStore for FileWhitelistStore {
    async fn setup(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(&self.path).await? {
            // Validate the existing document up front
            self.read_all().await?;
            return Ok(());
        }
        self.write_all(&HashMap::new()).await?;
        tracing::info!(path = %self.path.display(), "Whitelist file created");
        Ok(())
    }

    async fn load(&self, role: &RoleId) -> Result<Whitelist> {
        let mut all = self.read_all().await?;
        let whitelist = all.remove(role).unwrap_or_default();
        tracing::debug!(
            path = %self.path.display(),
            role = %role,
            resources = whitelist.len(),
            "Whitelist loaded"
        );
        Ok(whitelist)
    }

    fn name(&self) -> &str {
        "file"
    }
}
