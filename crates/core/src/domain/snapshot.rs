use crate::domain::feed::GainerItem;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date addressing one directory of the snapshot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotDate(NaiveDate);

impl SnapshotDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// The previous calendar day. `None` only at the minimum representable date.
    pub fn pred(self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    pub fn days_back(self, days: u32) -> Option<Self> {
        self.0
            .checked_sub_days(chrono::Days::new(u64::from(days)))
            .map(Self)
    }

    /// `YYYYMMDD`, as chart providers expect.
    pub fn compact(&self) -> String {
        format!("{:04}{:02}{:02}", self.0.year(), self.0.month(), self.0.day())
    }
}

impl fmt::Display for SnapshotDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for SnapshotDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map(Self)
    }
}

impl From<NaiveDate> for SnapshotDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

/// Combined content of one resolved date.
///
/// `date` is `None` only for the not-found state, where both collections are empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSnapshot {
    pub date: Option<SnapshotDate>,
    pub gainers: Vec<GainerItem>,
    pub theme_body: String,
}

impl ResolvedSnapshot {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn is_not_found(&self) -> bool {
        self.date.is_none()
    }

    pub fn has_content(&self) -> bool {
        !self.gainers.is_empty() || !self.theme_body.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> SnapshotDate {
        SnapshotDate::from_ymd(y, m, day).unwrap()
    }

    #[test]
    fn pred_crosses_into_leap_day() {
        assert_eq!(d(2024, 3, 1).pred(), Some(d(2024, 2, 29)));
    }

    #[test]
    fn pred_crosses_non_leap_february() {
        assert_eq!(d(2025, 3, 1).pred(), Some(d(2025, 2, 28)));
        assert_eq!(d(1900, 3, 1).pred(), Some(d(1900, 2, 28)));
        assert_eq!(d(2000, 3, 1).pred(), Some(d(2000, 2, 29)));
    }

    #[test]
    fn pred_crosses_year_boundary() {
        assert_eq!(d(2026, 1, 1).pred(), Some(d(2025, 12, 31)));
    }

    #[test]
    fn pred_crosses_thirty_day_months() {
        assert_eq!(d(2025, 5, 1).pred(), Some(d(2025, 4, 30)));
        assert_eq!(d(2025, 10, 1).pred(), Some(d(2025, 9, 30)));
        assert_eq!(d(2025, 8, 1).pred(), Some(d(2025, 7, 31)));
    }

    #[test]
    fn days_back_matches_repeated_pred() {
        let start = d(2024, 3, 10);
        let mut cur = start;
        for n in 1..=400 {
            cur = cur.pred().unwrap();
            assert_eq!(start.days_back(n), Some(cur));
        }
    }

    #[test]
    fn parses_and_displays_iso_dates() {
        let date: SnapshotDate = " 2025-11-03 ".parse().unwrap();
        assert_eq!(date, d(2025, 11, 3));
        assert_eq!(date.to_string(), "2025-11-03");
        assert_eq!(date.compact(), "20251103");
        assert!("2025-02-30".parse::<SnapshotDate>().is_err());
        assert!("20251103".parse::<SnapshotDate>().is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let v = serde_json::to_value(d(2024, 2, 29)).unwrap();
        assert_eq!(v, serde_json::json!("2024-02-29"));
    }

    #[test]
    fn not_found_snapshot_is_empty() {
        let s = ResolvedSnapshot::not_found();
        assert!(s.is_not_found());
        assert!(!s.has_content());
        assert!(s.gainers.is_empty());
        assert!(s.theme_body.is_empty());
    }
}
