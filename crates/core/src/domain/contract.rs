use crate::domain::feed::{GainerFeed, GainerItem, ThemeFeed};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// Published feed files wrap a single document in a JSON array. Older files and hand-written
// fixtures sometimes carry the bare object, so both shapes are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Envelope<T> {
    fn into_first(self) -> Option<T> {
        match self {
            Envelope::Many(docs) => docs.into_iter().next(),
            Envelope::One(doc) => Some(doc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireGainerDocument {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub date: String,
    pub items: Vec<WireGainerItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireGainerItem {
    pub name: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listed_shares: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireThemeDocument {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub date: String,
    pub body: String,
}

pub fn parse_gainer_feed(bytes: &[u8]) -> Result<GainerFeed> {
    let envelope = serde_json::from_slice::<Envelope<WireGainerDocument>>(bytes)
        .context("gainers feed does not match the expected document shape")?;
    let doc = envelope
        .into_first()
        .context("gainers feed array holds no document")?;
    doc.validate_and_into_feed()
}

pub fn parse_theme_feed(bytes: &[u8]) -> Result<ThemeFeed> {
    let envelope = serde_json::from_slice::<Envelope<WireThemeDocument>>(bytes)
        .context("themes feed does not match the expected document shape")?;
    let doc = envelope
        .into_first()
        .context("themes feed array holds no document")?;
    Ok(doc.into_feed())
}

impl WireGainerDocument {
    /// Items without a name or code are dropped so the rest of the ranking still renders.
    pub fn validate_and_into_feed(self) -> Result<GainerFeed> {
        let mut items = Vec::with_capacity(self.items.len());
        for (idx, item) in self.items.into_iter().enumerate() {
            match item.validate_and_into_item() {
                Ok(item) => items.push(item),
                Err(err) => {
                    tracing::warn!(index = idx, error = %err, "skipping invalid gainer item");
                }
            }
        }

        Ok(GainerFeed {
            title: self.title.trim().to_string(),
            source_url: self.url.trim().to_string(),
            date: self.date.trim().to_string(),
            items,
        })
    }
}

impl WireGainerItem {
    fn validate_and_into_item(self) -> Result<GainerItem> {
        let code = self.code.trim().to_string();
        anyhow::ensure!(!code.is_empty(), "code must be non-empty");

        let name = self.name.trim().to_string();
        anyhow::ensure!(!name.is_empty(), "name must be non-empty (code={code})");

        Ok(GainerItem {
            name,
            code,
            price: non_empty(self.price),
            change: non_empty(self.change),
            reason: self.reason.trim().to_string(),
            trading_value: non_empty(self.trading_value),
            market_cap: non_empty(self.market_cap),
            listed_shares: non_empty(self.listed_shares),
        })
    }
}

impl WireThemeDocument {
    fn into_feed(self) -> ThemeFeed {
        ThemeFeed {
            title: self.title.trim().to_string(),
            source_url: self.url.trim().to_string(),
            date: self.date.trim().to_string(),
            body: self.body.trim().to_string(),
        }
    }
}

impl From<&GainerFeed> for WireGainerDocument {
    fn from(feed: &GainerFeed) -> Self {
        Self {
            title: feed.title.clone(),
            url: feed.source_url.clone(),
            date: feed.date.clone(),
            items: feed
                .items
                .iter()
                .map(|item| WireGainerItem {
                    name: item.name.clone(),
                    code: item.code.clone(),
                    price: item.price.clone(),
                    change: item.change.clone(),
                    reason: item.reason.clone(),
                    trading_value: item.trading_value.clone(),
                    market_cap: item.market_cap.clone(),
                    listed_shares: item.listed_shares.clone(),
                })
                .collect(),
        }
    }
}

impl From<&ThemeFeed> for WireThemeDocument {
    fn from(feed: &ThemeFeed) -> Self {
        Self {
            title: feed.title.clone(),
            url: feed.source_url.clone(),
            date: feed.date.clone(),
            body: feed.body.clone(),
        }
    }
}

/// Serializes a feed in the published array envelope.
pub fn gainer_feed_to_json(feed: &GainerFeed) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(&[WireGainerDocument::from(feed)])
        .context("failed to serialize gainers feed")
}

pub fn theme_feed_to_json(feed: &ThemeFeed) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(&[WireThemeDocument::from(feed)])
        .context("failed to serialize themes feed")
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
