use crate::store::SnapshotSource;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Snapshot store rooted at a local directory (e.g. the site's `public/data`).
#[derive(Debug, Clone)]
pub struct DirSnapshotSource {
    root: PathBuf,
}

impl DirSnapshotSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path.trim_start_matches('/'));
        anyhow::ensure!(
            rel.components().all(|c| matches!(c, Component::Normal(_))),
            "snapshot path must stay inside the store root: {path}"
        );
        Ok(self.root.join(rel))
    }
}

#[async_trait::async_trait]
impl SnapshotSource for DirSnapshotSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).with_context(|| format!("snapshot probe failed: {}", full.display()))
            }
        }
    }

    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read snapshot: {}", full.display()))
            }
        }
    }
}
