use crate::store::SnapshotSource;
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    docs: BTreeMap<String, Vec<u8>>,
    failing: BTreeSet<String>,
    probes: Vec<String>,
}

/// In-process snapshot store, used for embedding and tests.
///
/// Paths registered with [`MemorySnapshotSource::fail`] return transport errors.
#[derive(Debug, Default)]
pub struct MemorySnapshotSource {
    inner: Mutex<Inner>,
}

impl MemorySnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, path: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.lock().docs.insert(path.into(), body.into());
    }

    pub fn insert_json(&self, path: impl Into<String>, value: &serde_json::Value) {
        self.insert(path, value.to_string());
    }

    pub fn fail(&self, path: impl Into<String>) {
        self.lock().failing.insert(path.into());
    }

    /// Every path passed to `exists`, in call order.
    pub fn probes(&self) -> Vec<String> {
        self.lock().probes.clone()
    }
}

#[async_trait::async_trait]
impl SnapshotSource for MemorySnapshotSource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let mut inner = self.lock();
        inner.probes.push(path.to_string());
        if inner.failing.contains(path) {
            anyhow::bail!("simulated transport failure: {path}");
        }
        Ok(inner.docs.contains_key(path))
    }

    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let inner = self.lock();
        if inner.failing.contains(path) {
            anyhow::bail!("simulated transport failure: {path}");
        }
        Ok(inner.docs.get(path).cloned())
    }
}
