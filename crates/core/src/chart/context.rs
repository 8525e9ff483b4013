use crate::chart::series::ChartSeries;
use crate::chart::TimeFrame;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Live rendering context for one expanded instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartContext {
    pub id: Uuid,
    pub code: String,
    pub time_frame: TimeFrame,
    pub series: Arc<ChartSeries>,
}

/// At most one context per instrument code. `acquire` releases any previous context for the
/// code before installing the new one; `release` is idempotent.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    live: HashMap<String, ChartContext>,
}

impl ContextRegistry {
    pub fn acquire(&mut self, code: &str, time_frame: TimeFrame, series: ChartSeries) -> &ChartContext {
        self.release(code);

        let ctx = ChartContext {
            id: Uuid::new_v4(),
            code: code.to_string(),
            time_frame,
            series: Arc::new(series),
        };
        tracing::debug!(code, context_id = %ctx.id, %time_frame, points = ctx.series.len(), "chart context acquired");
        self.live.entry(code.to_string()).or_insert(ctx)
    }

    pub fn release(&mut self, code: &str) -> Option<ChartContext> {
        let released = self.live.remove(code);
        if let Some(ctx) = &released {
            tracing::debug!(code, context_id = %ctx.id, "chart context released");
        }
        released
    }

    pub fn release_all(&mut self) -> usize {
        let n = self.live.len();
        self.live.clear();
        n
    }

    pub fn get(&self, code: &str) -> Option<&ChartContext> {
        self.live.get(code)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> ChartSeries {
        ChartSeries::from_newest_first(vec![("20251103".to_string(), 1.0)])
    }

    #[test]
    fn acquire_replaces_previous_context_for_code() {
        let mut reg = ContextRegistry::default();
        let first = reg.acquire("005930", TimeFrame::Day, series()).id;
        let second = reg.acquire("005930", TimeFrame::Week, series()).id;

        assert_ne!(first, second);
        assert_eq!(reg.live_count(), 1);
        assert_eq!(reg.get("005930").unwrap().time_frame, TimeFrame::Week);
    }

    #[test]
    fn release_is_idempotent() {
        let mut reg = ContextRegistry::default();
        reg.acquire("005930", TimeFrame::Day, series());
        assert!(reg.release("005930").is_some());
        assert!(reg.release("005930").is_none());
        assert!(reg.release("000660").is_none());
        assert_eq!(reg.live_count(), 0);
    }
}
