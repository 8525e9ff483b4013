use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockbrief_core::config::Settings;
use stockbrief_core::digest::display::{DigestView, Viewer};
use stockbrief_core::digest::{DigestContext, RefreshOutcome};
use stockbrief_core::store::{self, SnapshotPaths};
use stockbrief_core::time::kr_market;

mod chart;
mod publish;

#[derive(Debug, Parser)]
#[command(name = "stockbrief_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Find the most recent usable snapshot and print its digest.
    Resolve {
        /// Start date (YYYY-MM-DD). Defaults to the index pointer, then today's KST date.
        #[arg(long)]
        today: Option<String>,

        /// Maximum number of days to step back.
        #[arg(long)]
        lookback: Option<u32>,

        /// Print the display model as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Write feed documents for a date into the snapshot directory and refresh `index.json`.
    Publish(publish::PublishArgs),
    /// Point `index.json` at the newest dated directory.
    Reindex {
        #[arg(long)]
        today: Option<String>,
    },
    /// Drive the persisted chart session.
    #[command(subcommand)]
    Chart(chart::ChartCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let result = run(&settings, args.command).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker command failed");
    }
    result
}

async fn run(settings: &Settings, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Resolve {
            today,
            lookback,
            json,
        } => {
            let ctx = DigestContext::new(
                store::source_from_settings(settings)?,
                SnapshotPaths::from_settings(settings),
                lookback.unwrap_or(settings.lookback_days),
            );

            let digest = match today.as_deref() {
                Some(_) => {
                    let start = kr_market::resolve_today(today.as_deref(), chrono::Utc::now())?;
                    ctx.resolve_from(start).await
                }
                None => {
                    let today = kr_market::today_kst(chrono::Utc::now())?;
                    match ctx.refresh(today).await {
                        RefreshOutcome::Updated(digest) => (*digest).clone(),
                        RefreshOutcome::Skipped => anyhow::bail!("digest refresh already in flight"),
                    }
                }
            };

            let view = digest.view(Viewer::Anonymous);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", render_text(&view));
            }
            Ok(())
        }
        Command::Publish(args) => publish::run(settings, args).await,
        Command::Reindex { today } => {
            let today = kr_market::resolve_today(today.as_deref(), chrono::Utc::now())?;
            let latest = publish::publisher(settings)?.rebuild_index(today).await?;
            println!("index.json -> {latest}");
            Ok(())
        }
        Command::Chart(cmd) => chart::run(settings, cmd).await,
    }
}

fn render_text(view: &DigestView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.heading);
    if let Some(notice) = &view.notice {
        let _ = writeln!(out, "! {notice}");
    }

    let _ = writeln!(out, "\n[급등 종목]");
    if let Some(msg) = view.gainers.empty_message {
        let _ = writeln!(out, "  {msg}");
    }
    for row in &view.gainers.rows {
        let _ = writeln!(
            out,
            "  {} ({}) {} {}{} - {}",
            row.name,
            row.code,
            row.price.as_deref().unwrap_or("-"),
            row.arrow.unwrap_or(""),
            row.change.as_deref().unwrap_or(""),
            row.reason
        );
    }

    let _ = writeln!(out, "\n[테마]");
    match view.themes.empty_message {
        Some(msg) => {
            let _ = writeln!(out, "  {msg}");
        }
        None => {
            let _ = writeln!(out, "{}", view.themes.body);
        }
    }
    out
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbrief_core::digest::display;
    use stockbrief_core::domain::{GainerFeed, GainerItem, ResolvedSnapshot, SnapshotDate};

    #[test]
    fn text_digest_marks_missing_sections() {
        let date = SnapshotDate::from_ymd(2025, 11, 3).unwrap();
        let feed = GainerFeed {
            title: String::new(),
            source_url: String::new(),
            date: String::new(),
            items: vec![GainerItem {
                name: "삼성전자".to_string(),
                code: "005930".to_string(),
                price: Some("98700".to_string()),
                change: Some("+1.6%".to_string()),
                reason: "반도체".to_string(),
                trading_value: None,
                market_cap: None,
                listed_shares: None,
            }],
        };
        let view = DigestView::render(&display::build(date, Some(feed), None), None, Viewer::Anonymous);
        let text = render_text(&view);

        assert!(text.starts_with("2025-11-03 장 마감 브리핑\n"));
        assert!(text.contains("삼성전자 (005930) 98,700 ▲+1.6% - 반도체"));
        assert!(text.contains("[테마]\n  데이터가 없습니다."));
    }

    #[test]
    fn text_digest_shows_notice_when_nothing_found() {
        let view = DigestView::render(
            &ResolvedSnapshot::not_found(),
            Some("최근 15일 이내 브리핑 데이터가 없습니다.".to_string()),
            Viewer::Anonymous,
        );
        let text = render_text(&view);
        assert!(text.contains("! 최근 15일"));
        assert_eq!(text.matches("데이터가 없습니다.").count(), 3);
    }

    #[test]
    fn parses_chart_subcommands() {
        let args = Args::try_parse_from(["stockbrief_worker", "chart", "frame", "005930", "minute:5"]).unwrap();
        assert!(matches!(args.command, Command::Chart(chart::ChartCommand::Frame { .. })));

        let args = Args::try_parse_from(["stockbrief_worker", "resolve", "--lookback", "3", "--json"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Resolve {
                lookback: Some(3),
                json: true,
                ..
            }
        ));
    }
}
