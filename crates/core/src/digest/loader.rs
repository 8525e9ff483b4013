use crate::domain::contract::{parse_gainer_feed, parse_theme_feed};
use crate::domain::{FeedKind, GainerFeed, SnapshotDate, ThemeFeed};
use crate::store::{SnapshotPaths, SnapshotSource};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedFeeds {
    pub gainers: Option<GainerFeed>,
    pub themes: Option<ThemeFeed>,
}

/// Fetches both feeds of one date. Each degrades to `None` on its own.
pub struct SnapshotLoader<'a> {
    source: &'a dyn SnapshotSource,
    paths: &'a SnapshotPaths,
}

impl<'a> SnapshotLoader<'a> {
    pub fn new(source: &'a dyn SnapshotSource, paths: &'a SnapshotPaths) -> Self {
        Self { source, paths }
    }

    pub async fn load(&self, date: SnapshotDate) -> LoadedFeeds {
        let (gainers, themes) = tokio::join!(
            self.fetch_feed(date, FeedKind::Gainers, parse_gainer_feed),
            self.fetch_feed(date, FeedKind::Themes, parse_theme_feed),
        );
        LoadedFeeds { gainers, themes }
    }

    async fn fetch_feed<T>(
        &self,
        date: SnapshotDate,
        kind: FeedKind,
        parse: fn(&[u8]) -> anyhow::Result<T>,
    ) -> Option<T> {
        let path = self.paths.feed_path(date, kind);
        let bytes = match self.source.fetch(&path).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(%date, feed = kind.label(), "feed not published");
                return None;
            }
            Err(err) => {
                tracing::warn!(%date, feed = kind.label(), error = %err, "feed fetch failed");
                return None;
            }
        };

        match parse(&bytes) {
            Ok(feed) => Some(feed),
            Err(err) => {
                tracing::warn!(%date, feed = kind.label(), error = %format!("{err:#}"), "feed malformed; ignoring");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySnapshotSource;
    use serde_json::json;

    fn date() -> SnapshotDate {
        SnapshotDate::from_ymd(2025, 11, 3).unwrap()
    }

    fn gainers_json() -> serde_json::Value {
        json!([{
            "title": "상한가/급등종목",
            "url": "https://stock.mk.co.kr/news/view/1",
            "date": "2025-11-03",
            "items": [{"name": "삼성전자", "code": "005930", "price": "98700", "change": "+3.1%", "reason": "실적"}]
        }])
    }

    #[tokio::test]
    async fn loads_both_feeds() {
        let src = MemorySnapshotSource::new();
        let paths = SnapshotPaths::default();
        src.insert_json(paths.feed_path(date(), FeedKind::Gainers), &gainers_json());
        src.insert_json(
            paths.feed_path(date(), FeedKind::Themes),
            &json!([{"title": "특징 테마", "url": "", "date": "2025-11-03", "body": "조선 강세"}]),
        );

        let feeds = SnapshotLoader::new(&src, &paths).load(date()).await;
        assert_eq!(feeds.gainers.unwrap().items[0].code, "005930");
        assert_eq!(feeds.themes.unwrap().body, "조선 강세");
    }

    #[tokio::test]
    async fn malformed_theme_does_not_hide_gainers() {
        let src = MemorySnapshotSource::new();
        let paths = SnapshotPaths::default();
        src.insert_json(paths.feed_path(date(), FeedKind::Gainers), &gainers_json());
        src.insert(paths.feed_path(date(), FeedKind::Themes), "<html>502</html>");

        let feeds = SnapshotLoader::new(&src, &paths).load(date()).await;
        assert!(feeds.gainers.is_some());
        assert!(feeds.themes.is_none());
    }

    #[tokio::test]
    async fn failing_gainers_does_not_hide_themes() {
        let src = MemorySnapshotSource::new();
        let paths = SnapshotPaths::default();
        src.fail(paths.feed_path(date(), FeedKind::Gainers));
        src.insert_json(
            paths.feed_path(date(), FeedKind::Themes),
            &json!({"body": "2차전지 반등"}),
        );

        let feeds = SnapshotLoader::new(&src, &paths).load(date()).await;
        assert!(feeds.gainers.is_none());
        assert_eq!(feeds.themes.unwrap().body, "2차전지 반등");
    }

    #[tokio::test]
    async fn missing_date_loads_nothing() {
        let src = MemorySnapshotSource::new();
        let paths = SnapshotPaths::default();
        let feeds = SnapshotLoader::new(&src, &paths).load(date()).await;
        assert_eq!(feeds, LoadedFeeds::default());
    }
}
