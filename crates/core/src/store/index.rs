use crate::domain::SnapshotDate;
use crate::store::{SnapshotSource, INDEX_PATH};
use serde::{Deserialize, Serialize};

/// `index.json`: the nominal latest date written by the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPointer {
    pub latest_date: String,
}

impl IndexPointer {
    pub fn new(latest: SnapshotDate) -> Self {
        Self {
            latest_date: latest.to_string(),
        }
    }

    pub fn latest(&self) -> Option<SnapshotDate> {
        self.latest_date.parse().ok()
    }
}

/// Reads the index pointer. Missing, unreadable or malformed indexes yield `None` so the
/// caller can fall back to its own notion of today.
pub async fn read_latest_date(source: &dyn SnapshotSource) -> Option<SnapshotDate> {
    let bytes = match source.fetch(INDEX_PATH).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!(store = %source.describe(), "index pointer missing");
            return None;
        }
        Err(err) => {
            tracing::warn!(store = %source.describe(), error = %err, "index pointer unreadable");
            return None;
        }
    };

    let latest = serde_json::from_slice::<IndexPointer>(&bytes)
        .ok()
        .and_then(|idx| idx.latest());
    if latest.is_none() {
        tracing::warn!(store = %source.describe(), "index pointer malformed; ignoring");
    }
    latest
}
