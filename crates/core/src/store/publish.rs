use crate::domain::contract::{gainer_feed_to_json, theme_feed_to_json};
use crate::domain::{FeedKind, GainerFeed, SnapshotDate, ThemeFeed};
use crate::store::atomic::write_atomic_file;
use crate::store::index::IndexPointer;
use crate::store::{SnapshotPaths, INDEX_PATH, MASTER_PATH};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One line of the cumulative gainer history in `master.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterEntry {
    pub date: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub change: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub gainers_written: bool,
    pub themes_written: bool,
    pub master_appended: usize,
}

/// Writes feed documents into a directory store and maintains `index.json`/`master.json`.
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    root: PathBuf,
    paths: SnapshotPaths,
}

impl SnapshotPublisher {
    pub fn new(root: impl Into<PathBuf>, paths: SnapshotPaths) -> Self {
        Self {
            root: root.into(),
            paths,
        }
    }

    /// Empty feeds are skipped: a date directory only gains files that have content.
    pub async fn publish(
        &self,
        date: SnapshotDate,
        gainers: Option<&GainerFeed>,
        themes: Option<&ThemeFeed>,
    ) -> Result<PublishReport> {
        let mut report = PublishReport::default();

        if let Some(feed) = gainers.filter(|f| !f.items.is_empty()) {
            let bytes = gainer_feed_to_json(feed)?;
            self.write(&self.paths.feed_path(date, FeedKind::Gainers), bytes)
                .await?;
            report.gainers_written = true;
            report.master_appended = self.append_master(date, feed).await?;
        }

        if let Some(feed) = themes.filter(|f| !f.body.trim().is_empty()) {
            let bytes = theme_feed_to_json(feed)?;
            self.write(&self.paths.feed_path(date, FeedKind::Themes), bytes)
                .await?;
            report.themes_written = true;
        }

        tracing::info!(
            %date,
            gainers_written = report.gainers_written,
            themes_written = report.themes_written,
            master_appended = report.master_appended,
            "published snapshot"
        );
        Ok(report)
    }

    /// Points `index.json` at the newest dated directory, or at `today` if there is none.
    pub async fn rebuild_index(&self, today: SnapshotDate) -> Result<SnapshotDate> {
        let latest = self.latest_dated_dir().await?.unwrap_or(today);
        let bytes = serde_json::to_vec_pretty(&IndexPointer::new(latest))
            .context("failed to serialize index pointer")?;
        self.write(INDEX_PATH, bytes).await?;
        tracing::info!(%latest, "index pointer updated");
        Ok(latest)
    }

    async fn latest_dated_dir(&self) -> Result<Option<SnapshotDate>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to list {}", self.root.display()))
            }
        };

        let mut latest: Option<SnapshotDate> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("failed to list {}", self.root.display()))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let Some(date) = entry
                .file_name()
                .to_str()
                .filter(|name| name.len() == 10)
                .and_then(|name| name.parse::<SnapshotDate>().ok())
            else {
                continue;
            };
            latest = Some(latest.map_or(date, |cur| cur.max(date)));
        }
        Ok(latest)
    }

    async fn append_master(&self, date: SnapshotDate, feed: &GainerFeed) -> Result<usize> {
        let path = self.root.join(MASTER_PATH);
        let mut entries: Vec<MasterEntry> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("{} is not a valid history file", path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        let date = date.to_string();
        for item in &feed.items {
            entries.push(MasterEntry {
                date: date.clone(),
                name: item.name.clone(),
                code: item.code.clone(),
                price: item.price.clone().unwrap_or_default(),
                change: item.change.clone().unwrap_or_default(),
                reason: item.reason.clone(),
            });
        }

        let bytes = serde_json::to_vec_pretty(&entries).context("failed to serialize history")?;
        self.write(MASTER_PATH, bytes).await?;
        Ok(feed.items.len())
    }

    async fn write(&self, rel: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.root.join(rel);
        tokio::task::spawn_blocking(move || write_atomic_file(&path, &bytes))
            .await
            .context("join write task failed")?
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GainerItem;

    fn item(code: &str) -> GainerItem {
        GainerItem {
            name: format!("종목{code}"),
            code: code.to_string(),
            price: Some("12,300".to_string()),
            change: Some("+30.00%".to_string()),
            reason: "수주 공시".to_string(),
            trading_value: None,
            market_cap: None,
            listed_shares: None,
        }
    }

    fn gainers(items: Vec<GainerItem>) -> GainerFeed {
        GainerFeed {
            title: "상한가/급등종목".to_string(),
            source_url: "https://stock.mk.co.kr/news/view/1".to_string(),
            date: "2025-11-03".to_string(),
            items,
        }
    }

    fn themes(body: &str) -> ThemeFeed {
        ThemeFeed {
            title: "특징 테마".to_string(),
            source_url: "https://stock.mk.co.kr/news/view/2".to_string(),
            date: "2025-11-03".to_string(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn writes_only_non_empty_feeds() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = SnapshotPublisher::new(dir.path(), SnapshotPaths::default());
        let date = SnapshotDate::from_ymd(2025, 11, 3).unwrap();

        let report = publisher
            .publish(date, Some(&gainers(vec![])), Some(&themes("반도체 강세")))
            .await
            .unwrap();
        assert!(!report.gainers_written);
        assert!(report.themes_written);
        assert!(!dir.path().join("2025-11-03/infostock_gainers.json").exists());
        assert!(dir.path().join("2025-11-03/infostock_themes.json").exists());
        assert!(!dir.path().join(MASTER_PATH).exists());
    }

    #[tokio::test]
    async fn appends_history_across_dates() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = SnapshotPublisher::new(dir.path(), SnapshotPaths::default());
        let d1 = SnapshotDate::from_ymd(2025, 10, 31).unwrap();
        let d2 = SnapshotDate::from_ymd(2025, 11, 3).unwrap();

        publisher
            .publish(d1, Some(&gainers(vec![item("005930")])), None)
            .await
            .unwrap();
        let report = publisher
            .publish(d2, Some(&gainers(vec![item("000660"), item("086520")])), None)
            .await
            .unwrap();
        assert_eq!(report.master_appended, 2);

        let raw = std::fs::read(dir.path().join(MASTER_PATH)).unwrap();
        let entries: Vec<MasterEntry> = serde_json::from_slice(&raw).unwrap();
        let keys: Vec<_> = entries
            .iter()
            .map(|e| (e.date.as_str(), e.code.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2025-10-31", "005930"),
                ("2025-11-03", "000660"),
                ("2025-11-03", "086520"),
            ]
        );
    }

    #[tokio::test]
    async fn index_points_at_newest_dated_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2025-10-30", "2025-11-03", "2025-11-01", "backup", "2025-1-09"] {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("2099-01-01"), b"file, not a dir").unwrap();

        let publisher = SnapshotPublisher::new(dir.path(), SnapshotPaths::default());
        let today = SnapshotDate::from_ymd(2025, 11, 5).unwrap();
        let latest = publisher.rebuild_index(today).await.unwrap();
        assert_eq!(latest, SnapshotDate::from_ymd(2025, 11, 3).unwrap());

        let raw = std::fs::read(dir.path().join(INDEX_PATH)).unwrap();
        let idx: IndexPointer = serde_json::from_slice(&raw).unwrap();
        assert_eq!(idx.latest_date, "2025-11-03");
    }

    #[tokio::test]
    async fn index_falls_back_to_today_for_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = SnapshotPublisher::new(dir.path().join("data"), SnapshotPaths::default());
        let today = SnapshotDate::from_ymd(2025, 11, 5).unwrap();
        assert_eq!(publisher.rebuild_index(today).await.unwrap(), today);
    }
}
