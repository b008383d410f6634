//! # bx-cache-fs
//! bike-exchange/crates/bx-plugins/bx-cache-fs/src/lib.rs
//! Local filesystem implementation of `KeyValueStore`.
//! Features: hashed file names, directory sharding, and atomic replacement.

use async_trait::async_trait;
use bx_core::error::{AppError, Result};
use bx_core::traits::KeyValueStore;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Staging files older than this belong to a write that never finished.
const STALE_STAGING: Duration = Duration::from_secs(60);

fn io_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::Internal(format!("failed to {action} {}: {err}", path.display()))
}

fn is_staging_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}

/// Removes staging files left behind by writes that were dropped between
/// the write and the rename. Best effort.
async fn sweep_stale_staging(dir: &Path) {
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if !entry.file_name().to_str().is_some_and(is_staging_file) {
            continue;
        }
        let stale = entry
            .metadata()
            .await
            .ok()
            .and_then(|meta| meta.modified().ok())
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age >= STALE_STAGING);
        if stale {
            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed stale staging file"),
                Err(err) => tracing::debug!(path = %path.display(), error = %err, "Could not remove stale staging file"),
            }
        }
    }
}

pub struct FileStore {
    /// Root directory for all entries (e.g., "./data/cache")
    root_path: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root_path: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Generates a sharded path: "ab/cd/abcd...hash.json"
    fn entry_path(&self, key: &str) -> PathBuf {
        let hash = hex::encode(Sha256::digest(key.as_bytes()));
        let mut path = self.root_path.clone();
        path.push(&hash[0..2]);
        path.push(&hash[2..4]);
        path.push(format!("{hash}.json"));
        path
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key);
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error("read", &path, err)),
        }
    }

    /// Writes to a sibling temp file and renames it over the entry, so a
    /// crash mid-write never leaves a truncated entry behind. Temp files a
    /// dropped write left in the same shard are swept first.
    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.entry_path(key);
        let Some(parent) = path.parent() else {
            return Err(AppError::Internal(format!(
                "cache entry {} has no parent directory",
                path.display()
            )));
        };
        fs::create_dir_all(parent)
            .await
            .map_err(|err| io_error("create", parent, err))?;
        sweep_stale_staging(parent).await;

        let staging = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&staging, value.as_bytes())
            .await
            .map_err(|err| io_error("write", &staging, err))?;
        if let Err(err) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(io_error("replace", &path, err));
        }
        tracing::debug!(%key, path = %path.display(), "Cache entry written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("remove", &path, err)),
        }
    }
}
