use crate::chart::error::SeriesFetchError;
use crate::chart::series::{parse_series_rows, ChartSeries};
use crate::chart::TimeFrame;
use crate::config::Settings;
use crate::domain::SnapshotDate;
use crate::time::kr_market;
use anyhow::{Context, Result};
use encoding_rs::{Encoding, EUC_KR, UTF_8};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 20;
const MAX_BACKOFF_SHIFT: u32 = 5;

#[async_trait::async_trait]
pub trait ChartSeriesProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_series(&self, code: &str, time_frame: TimeFrame) -> Result<ChartSeries>;
}

#[derive(Debug, Clone)]
pub struct HttpChartSeriesProvider {
    http: reqwest::Client,
    base_url: String,
    close_index: usize,
    retries: u32,
}

impl HttpChartSeriesProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build chart http client")?;

        Ok(Self {
            http,
            base_url: settings.chart_base_url.clone(),
            close_index: settings.chart_close_index,
            retries: settings.chart_retries.max(1),
        })
    }

    fn query(code: &str, time_frame: TimeFrame, end: SnapshotDate) -> Vec<(&'static str, String)> {
        let start = end.days_back(time_frame.span_days()).unwrap_or(end);
        let mut params = vec![
            ("symbol", code.to_string()),
            ("requestType", "1".to_string()),
            ("startTime", start.compact()),
            ("endTime", end.compact()),
            ("timeframe", time_frame.provider_param().to_string()),
        ];
        if let TimeFrame::Minutes(n) = time_frame {
            params.push(("interval", n.to_string()));
        }
        params
    }

    async fn fetch_once(&self, code: &str, time_frame: TimeFrame) -> Result<String, Attempt> {
        let end = kr_market::today_kst(chrono::Utc::now()).map_err(|e| Attempt::fatal("request", e))?;
        let res = self
            .http
            .get(&self.base_url)
            .query(&Self::query(code, time_frame, end))
            .send()
            .await
            .map_err(|e| Attempt::retryable("request", e.into()))?;

        let status = res.status();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = res
            .bytes()
            .await
            .map_err(|e| Attempt::retryable("read", e.into()))?;

        if !status.is_success() {
            let err = anyhow::anyhow!("HTTP {status}");
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            return Err(if retryable {
                Attempt::retryable("http", err)
            } else {
                Attempt::fatal("http", err)
            });
        }

        Ok(decode_body(&bytes, content_type.as_deref()))
    }
}

struct Attempt {
    stage: &'static str,
    retryable: bool,
    err: anyhow::Error,
}

impl Attempt {
    fn retryable(stage: &'static str, err: anyhow::Error) -> Self {
        Self {
            stage,
            retryable: true,
            err,
        }
    }

    fn fatal(stage: &'static str, err: anyhow::Error) -> Self {
        Self {
            stage,
            retryable: false,
            err,
        }
    }
}

#[async_trait::async_trait]
impl ChartSeriesProvider for HttpChartSeriesProvider {
    fn provider_name(&self) -> &'static str {
        "naver_sise_json"
    }

    async fn fetch_series(&self, code: &str, time_frame: TimeFrame) -> Result<ChartSeries> {
        let fail = |stage: &'static str, err: anyhow::Error| SeriesFetchError {
            code: code.to_string(),
            time_frame,
            stage,
            detail: format!("{err:#}"),
        };

        let mut attempt: u32 = 0;
        let body = loop {
            attempt += 1;
            match self.fetch_once(code, time_frame).await {
                Ok(body) => break body,
                Err(a) if a.retryable && attempt < self.retries => {
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(
                        attempt,
                        ?backoff,
                        code,
                        %time_frame,
                        stage = a.stage,
                        error = %a.err,
                        "chart series fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(a) => return Err(anyhow::Error::from(fail(a.stage, a.err))),
            }
        };

        parse_series_rows(&body, self.close_index).map_err(|e| anyhow::Error::from(fail("parse", e)))
    }
}

/// 1s, 2s, 4s, ... capped at 32s.
fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT))
}

/// Decodes a response body, honouring a `charset` in `Content-Type`. Without one, UTF-8 is
/// tried first and EUC-KR (common for Korean quote services) is the fallback.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type
        .and_then(|ct| {
            ct.split(';')
                .filter_map(|part| part.trim().strip_prefix("charset="))
                .next()
        })
        .and_then(|label| Encoding::for_label(label.trim_matches('"').as_bytes()));

    if let Some(encoding) = declared {
        let (text, _, _) = encoding.decode(bytes);
        return text.into_owned();
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, had_errors) = EUC_KR.decode(bytes);
            if had_errors {
                let (text, _, _) = UTF_8.decode(bytes);
                return text.into_owned();
            }
            text.into_owned()
        }
    }
}
