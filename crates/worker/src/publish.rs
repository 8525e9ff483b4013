use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use stockbrief_core::config::Settings;
use stockbrief_core::domain::contract::{parse_gainer_feed, parse_theme_feed};
use stockbrief_core::store::publish::SnapshotPublisher;
use stockbrief_core::store::SnapshotPaths;
use stockbrief_core::time::kr_market;

#[derive(Debug, clap::Args)]
pub struct PublishArgs {
    /// Snapshot date (YYYY-MM-DD). Defaults to today's KST date.
    #[arg(long)]
    date: Option<String>,

    /// Gainer feed document (array envelope or bare object).
    #[arg(long)]
    gainers: Option<PathBuf>,

    /// Theme feed document (array envelope or bare object).
    #[arg(long)]
    themes: Option<PathBuf>,
}

pub fn publisher(settings: &Settings) -> Result<SnapshotPublisher> {
    let root = settings.require_snapshot_dir()?;
    Ok(SnapshotPublisher::new(root, SnapshotPaths::from_settings(settings)))
}

pub async fn run(settings: &Settings, args: PublishArgs) -> Result<()> {
    anyhow::ensure!(
        args.gainers.is_some() || args.themes.is_some(),
        "nothing to publish: pass --gainers and/or --themes"
    );
    let today = kr_market::today_kst(chrono::Utc::now())?;
    let date = match args.date.as_deref() {
        Some(_) => kr_market::resolve_today(args.date.as_deref(), chrono::Utc::now())?,
        None => today,
    };

    let gainers = match &args.gainers {
        Some(path) => Some(parse_gainer_feed(&read_file(path).await?)
            .with_context(|| format!("{} is not a gainer feed", path.display()))?),
        None => None,
    };
    let themes = match &args.themes {
        Some(path) => Some(parse_theme_feed(&read_file(path).await?)
            .with_context(|| format!("{} is not a theme feed", path.display()))?),
        None => None,
    };

    let publisher = publisher(settings)?;
    let report = publisher
        .publish(date, gainers.as_ref(), themes.as_ref())
        .await?;
    let latest = publisher.rebuild_index(today.max(date)).await?;

    println!(
        "{date}: gainers={} themes={} master+={} index={latest}",
        report.gainers_written, report.themes_written, report.master_appended
    );
    Ok(())
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbrief_core::digest::DigestContext;
    use stockbrief_core::domain::SnapshotDate;
    use stockbrief_core::store::DirSnapshotSource;
    use std::sync::Arc;

    #[tokio::test]
    async fn published_files_resolve_through_dir_store() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let gainers = dir.path().join("gainers.json");
        let themes = dir.path().join("themes.json");
        std::fs::write(
            &gainers,
            r#"{"title": "상한가", "url": "", "date": "", "items": [{"name": "SK하이닉스", "code": "000660", "price": "201000", "change": "+5.2%", "reason": "HBM"}]}"#,
        )
        .unwrap();
        std::fs::write(&themes, r#"[{"title": "테마", "url": "", "date": "", "body": ""}]"#).unwrap();

        let settings = test_settings(&data);
        run(
            &settings,
            PublishArgs {
                date: Some("2025-11-03".to_string()),
                gainers: Some(gainers),
                themes: Some(themes),
            },
        )
        .await
        .unwrap();

        let date = SnapshotDate::from_ymd(2025, 11, 3).unwrap();
        assert!(data.join("2025-11-03/infostock_gainers.json").exists());
        // Empty theme body is not written.
        assert!(!data.join("2025-11-03/infostock_themes.json").exists());
        assert!(data.join("master.json").exists());

        let ctx = DigestContext::new(
            Arc::new(DirSnapshotSource::new(&data)),
            SnapshotPaths::default(),
            14,
        );
        let digest = ctx.resolve_from(SnapshotDate::from_ymd(2025, 11, 5).unwrap()).await;
        assert_eq!(digest.snapshot.date, Some(date));
        assert_eq!(digest.snapshot.gainers[0].code, "000660");
        assert!(digest.snapshot.theme_body.is_empty());
    }

    #[tokio::test]
    async fn rejects_empty_invocation_and_bad_documents() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir.path().join("data"));

        let none = PublishArgs {
            date: None,
            gainers: None,
            themes: None,
        };
        assert!(run(&settings, none).await.is_err());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "[]").unwrap();
        let err = run(
            &settings,
            PublishArgs {
                date: Some("2025-11-03".to_string()),
                gainers: Some(bad),
                themes: None,
            },
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("is not a gainer feed"));
    }

    fn test_settings(root: &Path) -> Settings {
        Settings {
            snapshot_base: root.display().to_string(),
            lookback_days: 14,
            gainers_feed: "infostock_gainers".to_string(),
            themes_feed: "infostock_themes".to_string(),
            snapshot_timeout_secs: 15,
            chart_base_url: "http://127.0.0.1:9/siseJson.naver".to_string(),
            chart_close_index: 4,
            chart_default_frame: Default::default(),
            chart_retries: 1,
            session_state_path: root.join("chart_session.json"),
            sentry_dsn: None,
        }
    }
}
