use crate::chart::TimeFrame;
use std::fmt;

#[derive(Debug, Clone)]
pub struct SeriesFetchError {
    pub code: String,
    pub time_frame: TimeFrame,
    pub stage: &'static str,
    pub detail: String,
}

impl fmt::Display for SeriesFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chart series error (code={}, time_frame={}, stage={}): {}",
            self.code, self.time_frame, self.stage, self.detail
        )
    }
}

impl std::error::Error for SeriesFetchError {}
