pub(crate) mod atomic;
pub mod dir;
pub mod http;
pub mod index;
pub mod memory;
pub mod publish;

use crate::config::Settings;
use crate::domain::{FeedKind, SnapshotDate};
use anyhow::Result;
use std::sync::Arc;

pub use dir::DirSnapshotSource;
pub use http::HttpSnapshotSource;
pub use memory::MemorySnapshotSource;

pub const INDEX_PATH: &str = "index.json";
pub const MASTER_PATH: &str = "master.json";

/// Read-only access to the snapshot store. Paths are relative to the store root.
///
/// `Ok(false)` / `Ok(None)` mean the document is not there; `Err` is reserved for transport
/// failures, which callers treat as absence but may count separately.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    fn describe(&self) -> String;

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>>;
}

/// `<date>/<feed-name>.json` addressing of the per-date feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub gainers_feed: String,
    pub themes_feed: String,
}

impl SnapshotPaths {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            gainers_feed: settings.gainers_feed.clone(),
            themes_feed: settings.themes_feed.clone(),
        }
    }

    pub fn feed_name(&self, kind: FeedKind) -> &str {
        match kind {
            FeedKind::Gainers => &self.gainers_feed,
            FeedKind::Themes => &self.themes_feed,
        }
    }

    pub fn feed_path(&self, date: SnapshotDate, kind: FeedKind) -> String {
        format!("{date}/{}.json", self.feed_name(kind))
    }
}

impl Default for SnapshotPaths {
    fn default() -> Self {
        Self {
            gainers_feed: "infostock_gainers".to_string(),
            themes_feed: "infostock_themes".to_string(),
        }
    }
}

pub fn source_from_settings(settings: &Settings) -> Result<Arc<dyn SnapshotSource>> {
    if settings.snapshot_base_is_http() {
        Ok(Arc::new(HttpSnapshotSource::from_settings(settings)?))
    } else {
        Ok(Arc::new(DirSnapshotSource::new(settings.snapshot_base.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_paths_follow_date_directory_convention() {
        let paths = SnapshotPaths::default();
        let date = SnapshotDate::from_ymd(2025, 1, 9).unwrap();
        assert_eq!(
            paths.feed_path(date, FeedKind::Gainers),
            "2025-01-09/infostock_gainers.json"
        );
        assert_eq!(
            paths.feed_path(date, FeedKind::Themes),
            "2025-01-09/infostock_themes.json"
        );
    }
}
