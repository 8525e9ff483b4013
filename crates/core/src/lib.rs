pub mod chart;
pub mod digest;
pub mod domain;
pub mod store;
pub mod time;

pub mod config {
    use crate::chart::TimeFrame;
    use anyhow::Context;
    use std::path::{Path, PathBuf};

    const DEFAULT_SNAPSHOT_BASE: &str = "./public/data";
    const DEFAULT_LOOKBACK_DAYS: u32 = 14;
    const DEFAULT_GAINERS_FEED: &str = "infostock_gainers";
    const DEFAULT_THEMES_FEED: &str = "infostock_themes";
    const DEFAULT_SNAPSHOT_TIMEOUT_SECS: u64 = 15;
    const DEFAULT_CHART_BASE_URL: &str = "https://api.finance.naver.com/siseJson.naver";
    const DEFAULT_CHART_CLOSE_INDEX: usize = 4;
    const DEFAULT_CHART_RETRIES: u32 = 3;
    const DEFAULT_SESSION_STATE_PATH: &str = "./.stockbrief/chart_session.json";

    #[derive(Debug, Clone)]
    pub struct Settings {
        /// Directory path or `http(s)://` URL of the snapshot store root.
        pub snapshot_base: String,
        pub lookback_days: u32,
        pub gainers_feed: String,
        pub themes_feed: String,
        pub snapshot_timeout_secs: u64,
        pub chart_base_url: String,
        pub chart_close_index: usize,
        pub chart_default_frame: TimeFrame,
        pub chart_retries: u32,
        pub session_state_path: PathBuf,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let chart_default_frame = match non_empty_var("CHART_DEFAULT_FRAME") {
                Some(s) => s
                    .parse::<TimeFrame>()
                    .with_context(|| format!("CHART_DEFAULT_FRAME is invalid: {s}"))?,
                None => TimeFrame::default(),
            };

            Ok(Self {
                snapshot_base: non_empty_var("SNAPSHOT_BASE")
                    .unwrap_or_else(|| DEFAULT_SNAPSHOT_BASE.to_string()),
                lookback_days: parsed_var("SNAPSHOT_LOOKBACK_DAYS").unwrap_or(DEFAULT_LOOKBACK_DAYS),
                gainers_feed: non_empty_var("SNAPSHOT_GAINERS_FEED")
                    .unwrap_or_else(|| DEFAULT_GAINERS_FEED.to_string()),
                themes_feed: non_empty_var("SNAPSHOT_THEMES_FEED")
                    .unwrap_or_else(|| DEFAULT_THEMES_FEED.to_string()),
                snapshot_timeout_secs: parsed_var("SNAPSHOT_TIMEOUT_SECS")
                    .unwrap_or(DEFAULT_SNAPSHOT_TIMEOUT_SECS),
                chart_base_url: non_empty_var("CHART_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_CHART_BASE_URL.to_string()),
                chart_close_index: parsed_var("CHART_CLOSE_INDEX")
                    .unwrap_or(DEFAULT_CHART_CLOSE_INDEX),
                chart_default_frame,
                chart_retries: parsed_var("CHART_RETRIES").unwrap_or(DEFAULT_CHART_RETRIES),
                session_state_path: non_empty_var("SESSION_STATE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_STATE_PATH)),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn snapshot_base_is_http(&self) -> bool {
            let base = self.snapshot_base.trim();
            base.starts_with("http://") || base.starts_with("https://")
        }

        /// Publishing writes files, so it needs a local directory store.
        pub fn require_snapshot_dir(&self) -> anyhow::Result<&Path> {
            anyhow::ensure!(
                !self.snapshot_base_is_http(),
                "SNAPSHOT_BASE must be a local directory for publishing (got {})",
                self.snapshot_base
            );
            Ok(Path::new(self.snapshot_base.trim()))
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
        non_empty_var(key).and_then(|s| s.parse::<T>().ok())
    }
}
