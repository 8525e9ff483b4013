pub mod display;
pub mod loader;
pub mod resolver;

use crate::config::Settings;
use crate::domain::{ResolvedSnapshot, SnapshotDate};
use crate::store::{index, SnapshotPaths, SnapshotSource};
use display::{DigestView, Viewer};
use loader::SnapshotLoader;
use resolver::{DateResolver, Resolution, ResolveReport};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Outcome of one resolve → load → build pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub snapshot: ResolvedSnapshot,
    pub report: ResolveReport,
}

impl Digest {
    /// Explanation shown above an empty page; `None` when a date was found.
    pub fn notice(&self) -> Option<String> {
        if self.report.store_unreachable() {
            return Some("데이터 저장소에 연결할 수 없습니다. 잠시 후 다시 시도해 주세요.".to_string());
        }
        match self.report.resolution {
            Resolution::Found(_) => None,
            Resolution::NotFound => Some(format!(
                "{} 기준 최근 {}일 이내 브리핑 데이터가 없습니다.",
                self.report.start,
                u64::from(self.report.max_lookback) + 1
            )),
        }
    }

    pub fn view(&self, viewer: Viewer) -> DigestView {
        DigestView::render(&self.snapshot, self.notice(), viewer)
    }
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Updated(Arc<Digest>),
    /// Another refresh was already in flight.
    Skipped,
}

/// Owns the store handle and the current digest. Constructed once and shared by handle.
pub struct DigestContext {
    source: Arc<dyn SnapshotSource>,
    paths: SnapshotPaths,
    lookback_days: u32,
    in_flight: Mutex<()>,
    current: RwLock<Option<Arc<Digest>>>,
}

impl DigestContext {
    pub fn new(source: Arc<dyn SnapshotSource>, paths: SnapshotPaths, lookback_days: u32) -> Self {
        Self {
            source,
            paths,
            lookback_days,
            in_flight: Mutex::new(()),
            current: RwLock::new(None),
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let source = crate::store::source_from_settings(settings)?;
        Ok(Self::new(
            source,
            SnapshotPaths::from_settings(settings),
            settings.lookback_days,
        ))
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    pub async fn current(&self) -> Option<Arc<Digest>> {
        self.current.read().await.clone()
    }

    /// Single-flight: a trigger while another refresh runs is skipped, never interleaved.
    pub async fn refresh(&self, today: SnapshotDate) -> RefreshOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::info!(%today, "digest refresh already in flight; skipping");
            return RefreshOutcome::Skipped;
        };

        let start = match index::read_latest_date(self.source.as_ref()).await {
            Some(latest) => latest,
            None => today,
        };
        let digest = Arc::new(self.resolve_from(start).await);
        *self.current.write().await = Some(digest.clone());
        RefreshOutcome::Updated(digest)
    }

    /// Current digest, resolving once if nothing has been loaded yet.
    pub async fn current_or_refresh(&self, today: SnapshotDate) -> Arc<Digest> {
        if let Some(digest) = self.current().await {
            return digest;
        }
        match self.refresh(today).await {
            RefreshOutcome::Updated(digest) => digest,
            RefreshOutcome::Skipped => {
                // Queue behind the in-flight refresh and take its result.
                drop(self.in_flight.lock().await);
                match self.current().await {
                    Some(digest) => digest,
                    None => Arc::new(self.resolve_from(today).await),
                }
            }
        }
    }

    /// One-shot resolution from an explicit start; does not replace the current digest.
    pub async fn resolve_from(&self, start: SnapshotDate) -> Digest {
        let source = self.source.as_ref();
        let report = DateResolver::new(source, &self.paths)
            .resolve(start, self.lookback_days)
            .await;

        let snapshot = match report.resolution {
            Resolution::Found(date) => {
                let feeds = SnapshotLoader::new(source, &self.paths).load(date).await;
                display::build(date, feeds.gainers, feeds.themes)
            }
            Resolution::NotFound => ResolvedSnapshot::not_found(),
        };

        tracing::info!(
            %start,
            date = ?snapshot.date,
            gainers = snapshot.gainers.len(),
            has_themes = !snapshot.theme_body.is_empty(),
            store = %source.describe(),
            "digest resolved"
        );
        Digest { snapshot, report }
    }
}
