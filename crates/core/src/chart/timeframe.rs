use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Chart granularity. Textual form: `day`, `week`, `month`, `minute:N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TimeFrame {
    #[default]
    Day,
    Week,
    Month,
    Minutes(u16),
}

impl TimeFrame {
    /// Value of the provider's `timeframe` query parameter.
    pub fn provider_param(&self) -> &'static str {
        match self {
            TimeFrame::Day => "day",
            TimeFrame::Week => "week",
            TimeFrame::Month => "month",
            TimeFrame::Minutes(_) => "minute",
        }
    }

    /// Calendar span requested from the provider for this granularity.
    pub fn span_days(&self) -> u32 {
        match self {
            TimeFrame::Day => 180,
            TimeFrame::Week => 3 * 365,
            TimeFrame::Month => 10 * 365,
            TimeFrame::Minutes(_) => 5,
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeFrame::Minutes(n) => write!(f, "minute:{n}"),
            other => f.write_str(other.provider_param()),
        }
    }
}

impl FromStr for TimeFrame {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "day" | "daily" | "d" => return Ok(TimeFrame::Day),
            "week" | "weekly" | "w" => return Ok(TimeFrame::Week),
            "month" | "monthly" | "m" => return Ok(TimeFrame::Month),
            _ => {}
        }

        let minutes = s
            .strip_prefix("minute:")
            .or_else(|| s.strip_suffix("min"))
            .with_context(|| format!("unknown time-frame: {s}"))?;
        let n = minutes
            .trim()
            .parse::<u16>()
            .with_context(|| format!("invalid minute count in time-frame: {s}"))?;
        anyhow::ensure!(n > 0, "minute time-frame must be at least 1 minute");
        Ok(TimeFrame::Minutes(n))
    }
}

impl Serialize for TimeFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: anyhow::Error| serde::de::Error::custom(format!("{e:#}")))
    }
}
