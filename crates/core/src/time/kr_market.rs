use crate::domain::SnapshotDate;
use anyhow::Context;
use chrono::{DateTime, Utc};

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Current KRX calendar date (KST, UTC+9).
pub fn today_kst(now_utc: DateTime<Utc>) -> anyhow::Result<SnapshotDate> {
    let kst = chrono::FixedOffset::east_opt(KST_OFFSET_SECS).context("invalid KST offset")?;
    Ok(SnapshotDate::new(now_utc.with_timezone(&kst).date_naive()))
}

/// Explicit `YYYY-MM-DD` argument wins; otherwise today's KST date.
pub fn resolve_today(today_arg: Option<&str>, now_utc: DateTime<Utc>) -> anyhow::Result<SnapshotDate> {
    if let Some(s) = today_arg {
        return s
            .parse::<SnapshotDate>()
            .with_context(|| format!("invalid date (expected YYYY-MM-DD): {s}"));
    }
    today_kst(now_utc)
}
