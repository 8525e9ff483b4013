use crate::domain::{FeedKind, SnapshotDate};
use crate::store::{SnapshotPaths, SnapshotSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(SnapshotDate),
    NotFound,
}

impl Resolution {
    pub fn date(&self) -> Option<SnapshotDate> {
        match self {
            Resolution::Found(d) => Some(*d),
            Resolution::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveReport {
    pub start: SnapshotDate,
    pub max_lookback: u32,
    pub resolution: Resolution,
    /// Candidate dates examined.
    pub candidates: u32,
    /// Candidates where every probe failed at the transport level.
    pub failed_candidates: u32,
}

impl ResolveReport {
    /// Nothing found and nothing answered: the store itself is down, not merely behind.
    pub fn store_unreachable(&self) -> bool {
        self.resolution == Resolution::NotFound
            && self.candidates > 0
            && self.failed_candidates == self.candidates
    }
}

/// Walks backward one calendar day at a time looking for a date with at least one feed.
pub struct DateResolver<'a> {
    source: &'a dyn SnapshotSource,
    paths: &'a SnapshotPaths,
}

enum Probe {
    Usable,
    Absent,
    Failed,
}

impl<'a> DateResolver<'a> {
    pub fn new(source: &'a dyn SnapshotSource, paths: &'a SnapshotPaths) -> Self {
        Self { source, paths }
    }

    /// Probes `start`, `start - 1`, ..., `start - max_lookback` and stops at the first usable
    /// date. Transport errors count as absence; there are no retries.
    pub async fn resolve(&self, start: SnapshotDate, max_lookback: u32) -> ResolveReport {
        let mut report = ResolveReport {
            start,
            max_lookback,
            resolution: Resolution::NotFound,
            candidates: 0,
            failed_candidates: 0,
        };

        let mut date = start;
        for step in 0..=max_lookback {
            report.candidates += 1;
            match self.probe(date).await {
                Probe::Usable => {
                    tracing::debug!(%start, %date, step, "resolved snapshot date");
                    report.resolution = Resolution::Found(date);
                    return report;
                }
                Probe::Absent => {}
                Probe::Failed => report.failed_candidates += 1,
            }

            if step == max_lookback {
                break;
            }
            match date.pred() {
                Some(prev) => date = prev,
                None => break,
            }
        }

        tracing::info!(
            %start,
            max_lookback,
            failed_candidates = report.failed_candidates,
            "no snapshot within lookback window"
        );
        report
    }

    async fn probe(&self, date: SnapshotDate) -> Probe {
        let mut failures = 0;
        for kind in [FeedKind::Gainers, FeedKind::Themes] {
            let path = self.paths.feed_path(date, kind);
            match self.source.exists(&path).await {
                Ok(true) => return Probe::Usable,
                Ok(false) => {}
                Err(err) => {
                    failures += 1;
                    tracing::warn!(%date, feed = kind.label(), error = %err, "snapshot probe failed");
                }
            }
        }

        if failures == 2 {
            Probe::Failed
        } else {
            Probe::Absent
        }
    }
}
