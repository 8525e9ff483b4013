use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockbrief_core::chart::{
    normalize_code, ChartSeries, ChartSeriesProvider, HttpChartSeriesProvider, SeriesFetchError,
    TimeFrame,
};
use stockbrief_core::digest::display::{DigestView, Viewer};
use stockbrief_core::digest::{DigestContext, RefreshOutcome};
use stockbrief_core::domain::SnapshotDate;
use stockbrief_core::time::kr_market;

const IDENTITY_HEADER: &str = "x-stockbrief-user";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockbrief_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let digest = Arc::new(DigestContext::from_settings(&settings)?);
    let charts: Arc<dyn ChartSeriesProvider> = Arc::new(HttpChartSeriesProvider::from_settings(&settings)?);
    tracing::info!(
        snapshot_base = %settings.snapshot_base,
        lookback_days = settings.lookback_days,
        chart_provider = charts.provider_name(),
        "api configured"
    );

    let state = AppState {
        digest,
        charts,
        default_frame: settings.chart_default_frame,
    };

    let app = router(state).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/digest", get(get_digest))
        .route("/digest/refresh", post(refresh_digest))
        .route("/digest/:date", get(get_digest_by_date))
        .route("/charts/:code", get(get_chart))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    digest: Arc<DigestContext>,
    charts: Arc<dyn ChartSeriesProvider>,
    default_frame: TimeFrame,
}

fn viewer(headers: &HeaderMap) -> Viewer {
    Viewer::from_identity(headers.get(IDENTITY_HEADER).and_then(|v| v.to_str().ok()))
}

fn today() -> Result<SnapshotDate, StatusCode> {
    kr_market::today_kst(chrono::Utc::now()).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "failed to determine today's date");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn get_digest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DigestView>, StatusCode> {
    let digest = state.digest.current_or_refresh(today()?).await;
    Ok(Json(digest.view(viewer(&headers))))
}

async fn refresh_digest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DigestView>, StatusCode> {
    match state.digest.refresh(today()?).await {
        RefreshOutcome::Updated(digest) => Ok(Json(digest.view(viewer(&headers)))),
        RefreshOutcome::Skipped => Err(StatusCode::CONFLICT),
    }
}

async fn get_digest_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DigestView>, StatusCode> {
    let start = date
        .parse::<SnapshotDate>()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let digest = state.digest.resolve_from(start).await;
    Ok(Json(digest.view(viewer(&headers))))
}

#[derive(Debug, Deserialize)]
struct ChartQuery {
    frame: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiChart {
    code: String,
    time_frame: TimeFrame,
    provider: &'static str,
    series: ChartSeries,
}

async fn get_chart(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ApiChart>, StatusCode> {
    let code = normalize_code(&code).map_err(|_| StatusCode::BAD_REQUEST)?;
    let time_frame = match query.frame.as_deref() {
        Some(raw) => raw.parse::<TimeFrame>().map_err(|_| StatusCode::BAD_REQUEST)?,
        None => state.default_frame,
    };

    let series = state
        .charts
        .fetch_series(&code, time_frame)
        .await
        .map_err(|e| {
            let stage = e.downcast_ref::<SeriesFetchError>().map(|d| d.stage);
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(code = %code, %time_frame, ?stage, error = %e, "chart series fetch failed");
            StatusCode::BAD_GATEWAY
        })?;

    Ok(Json(ApiChart {
        code,
        time_frame,
        provider: state.charts.provider_name(),
        series,
    }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stockbrief_core::config::Settings) -> Option<sentry::ClientInitGuard> {
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
    use axum::http::HeaderValue;
    use serde_json::json;
    use stockbrief_core::domain::FeedKind;
    use stockbrief_core::store::{MemorySnapshotSource, SnapshotPaths, INDEX_PATH};

    struct FixedProvider;

    #[async_trait::async_trait]
    impl ChartSeriesProvider for FixedProvider {
        fn provider_name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_series(&self, code: &str, time_frame: TimeFrame) -> anyhow::Result<ChartSeries> {
            if code == "999999" {
                return Err(SeriesFetchError {
                    code: code.to_string(),
                    time_frame,
                    stage: "http",
                    detail: "HTTP 503".to_string(),
                }
                .into());
            }
            Ok(ChartSeries::from_newest_first(vec![
                ("20251103".to_string(), 98700.0),
                ("20251031".to_string(), 97100.0),
            ]))
        }
    }

    fn state() -> AppState {
        let paths = SnapshotPaths::default();
        let date = SnapshotDate::from_ymd(2025, 11, 3).unwrap();
        let src = Arc::new(MemorySnapshotSource::new());
        src.insert_json(INDEX_PATH, &json!({"latestDate": "2025-11-03"}));
        src.insert_json(
            paths.feed_path(date, FeedKind::Gainers),
            &json!([{
                "title": "상한가/급등종목",
                "url": "",
                "date": "",
                "items": [{"name": "삼성전자", "code": "005930", "price": "98700", "change": "+1.6%", "reason": "반도체"}]
            }]),
        );

        AppState {
            digest: Arc::new(DigestContext::new(src, paths, 14)),
            charts: Arc::new(FixedProvider),
            default_frame: TimeFrame::Day,
        }
    }

    #[tokio::test]
    async fn digest_starts_from_index_pointer() {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("user-1"));

        let Json(view) = get_digest(State(state()), headers).await.unwrap();
        assert_eq!(view.date, SnapshotDate::from_ymd(2025, 11, 3));
        assert_eq!(view.heading, "2025-11-03 장 마감 브리핑");
        assert_eq!(view.gainers.rows[0].price.as_deref(), Some("98,700"));
        assert!(view.themes.empty_message.is_some());
        assert!(view.show_sign_out);
    }

    #[tokio::test]
    async fn digest_by_date_rejects_bad_dates() {
        let err = get_digest_by_date(State(state()), Path("2025-13-01".to_string()), HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::BAD_REQUEST);

        let Json(view) = get_digest_by_date(State(state()), Path("2025-11-05".to_string()), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(view.date, SnapshotDate::from_ymd(2025, 11, 3));
        assert!(!view.show_sign_out);
    }

    #[tokio::test]
    async fn chart_endpoint_validates_and_maps_failures() {
        let ok = get_chart(
            State(state()),
            Path("005930".to_string()),
            Query(ChartQuery {
                frame: Some("week".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(ok.0.time_frame, TimeFrame::Week);
        assert_eq!(ok.0.series.closing_prices(), &[97100.0, 98700.0]);

        let bad_code = get_chart(State(state()), Path("../x".to_string()), Query(ChartQuery { frame: None }))
            .await
            .unwrap_err();
        assert_eq!(bad_code, StatusCode::BAD_REQUEST);

        let bad_frame = get_chart(
            State(state()),
            Path("005930".to_string()),
            Query(ChartQuery {
                frame: Some("hourly".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(bad_frame, StatusCode::BAD_REQUEST);

        let upstream = get_chart(State(state()), Path("999999".to_string()), Query(ChartQuery { frame: None }))
            .await
            .unwrap_err();
        assert_eq!(upstream, StatusCode::BAD_GATEWAY);
    }
}
