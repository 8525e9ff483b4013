pub mod context;
pub mod error;
pub mod persist;
pub mod provider;
pub mod series;
pub mod session;
pub mod timeframe;

pub use context::ChartContext;
pub use error::SeriesFetchError;
pub use persist::{FileSessionStore, MemorySessionStore, SessionStore};
pub use provider::{ChartSeriesProvider, HttpChartSeriesProvider};
pub use series::ChartSeries;
pub use session::{ChartSessionManager, PanelStatus, SessionEvent};
pub use timeframe::TimeFrame;

const MAX_CODE_LEN: usize = 12;

/// Instrument codes are short ASCII alphanumerics (KRX: six digits).
pub fn normalize_code(raw: &str) -> anyhow::Result<String> {
    let code = raw.trim();
    anyhow::ensure!(!code.is_empty(), "instrument code is empty");
    anyhow::ensure!(
        code.len() <= MAX_CODE_LEN && code.chars().all(|c| c.is_ascii_alphanumeric()),
        "invalid instrument code: {code:?}"
    );
    Ok(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_codes() {
        assert_eq!(normalize_code(" 005930 ").unwrap(), "005930");
        assert_eq!(normalize_code("0088M0").unwrap(), "0088M0");
        assert!(normalize_code("").is_err());
        assert!(normalize_code("../etc").is_err());
        assert!(normalize_code("0123456789012").is_err());
    }
}
