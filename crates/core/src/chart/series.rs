use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

/// Closing-price series in chronological order. `labels` and `closing_prices` are index
/// aligned and always the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    labels: Vec<String>,
    closing_prices: Vec<f64>,
}

impl ChartSeries {
    /// Builds a series from provider rows delivered newest-first.
    pub fn from_newest_first(rows: Vec<(String, f64)>) -> Self {
        let (mut labels, mut closing_prices): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        labels.reverse();
        closing_prices.reverse();
        Self {
            labels,
            closing_prices,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn closing_prices(&self) -> &[f64] {
        &self.closing_prices
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn last_close(&self) -> Option<(&str, f64)> {
        let label = self.labels.last()?;
        let close = self.closing_prices.last()?;
        Some((label.as_str(), *close))
    }
}

/// Parses the provider's array-of-arrays body. The first element of each row is the
/// date/time label and `close_index` selects the closing price. A textual header row is
/// skipped. Some providers emit single-quoted pseudo-JSON, which is normalized first.
pub fn parse_series_rows(body: &str, close_index: usize) -> Result<ChartSeries> {
    let normalized = body.trim().replace('\'', "\"");
    let rows = serde_json::from_str::<Vec<Vec<Value>>>(&normalized)
        .context("chart response is not an array of rows")?;

    let mut parsed = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let Some(label) = row.first().and_then(cell_text) else {
            anyhow::bail!("chart row {idx} has no label");
        };
        if !label.chars().any(|c| c.is_ascii_digit()) {
            // Header such as ['날짜', '시가', '고가', '저가', '종가', ...].
            continue;
        }

        let close = row
            .get(close_index)
            .and_then(cell_number)
            .with_context(|| format!("chart row {idx} ({label}) has no numeric close at index {close_index}"))?;
        parsed.push((label, close));
    }

    anyhow::ensure!(!parsed.is_empty(), "chart response has no data rows");
    Ok(ChartSeries::from_newest_first(parsed))
}

fn cell_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn cell_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}
