use anyhow::Result;
use clap::Subcommand;
use std::sync::Arc;

use stockbrief_core::chart::{
    ChartSessionManager, ChartSeriesProvider, FileSessionStore, HttpChartSeriesProvider,
    PanelStatus, SessionEvent, SessionStore, TimeFrame,
};
use stockbrief_core::config::Settings;

#[derive(Debug, Subcommand)]
pub enum ChartCommand {
    /// Expand a collapsed chart panel, or collapse an expanded one.
    Toggle { code: String },
    /// Switch an expanded panel to another time-frame (day, week, month, minute:N).
    Frame { code: String, frame: TimeFrame },
    /// Re-issue the series fetch for an expanded panel.
    Retry { code: String },
    /// Print the expanded panels after their series settle.
    Show,
}

pub async fn run(settings: &Settings, cmd: ChartCommand) -> Result<()> {
    let provider: Arc<dyn ChartSeriesProvider> = Arc::new(HttpChartSeriesProvider::from_settings(settings)?);
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&settings.session_state_path));
    let mut session = ChartSessionManager::restore(provider, store, settings.chart_default_frame);

    match cmd {
        ChartCommand::Toggle { code } => emit(&session.toggle(&code)?)?,
        ChartCommand::Frame { code, frame } => emit(&session.select_time_frame(&code, frame)?)?,
        ChartCommand::Retry { code } => session.retry(&code)?,
        ChartCommand::Show => {}
    }

    while let Some(event) = session.next_event().await {
        emit(&event)?;
    }
    print!("{}", summary(&session));

    session.shutdown();
    Ok(())
}

fn emit(event: &SessionEvent) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

fn summary(session: &ChartSessionManager) -> String {
    let codes = session.expanded_codes();
    if codes.is_empty() {
        return "no expanded charts\n".to_string();
    }

    let mut out = String::new();
    for code in codes {
        let frame = session
            .time_frame(&code)
            .map(|tf| tf.to_string())
            .unwrap_or_default();
        let state = match session.status(&code) {
            Some(PanelStatus::Ready) => match session.context(&code).and_then(|c| c.series.last_close()) {
                Some((label, close)) => format!("ready, last close {close} @ {label}"),
                None => "ready".to_string(),
            },
            Some(PanelStatus::Loading) => "loading".to_string(),
            Some(PanelStatus::Failed(msg)) => format!("failed (retry with `chart retry {code}`): {msg}"),
            None => "unknown".to_string(),
        };
        out.push_str(&format!("{code} [{frame}] {state}\n"));
    }
    out
}
