use serde::{Deserialize, Serialize};

/// One row of the daily gainers report, in source ranking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GainerItem {
    pub name: String,
    pub code: String,
    pub price: Option<String>,
    pub change: Option<String>,
    pub reason: String,
    pub trading_value: Option<String>,
    pub market_cap: Option<String>,
    pub listed_shares: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GainerFeed {
    pub title: String,
    pub source_url: String,
    pub date: String,
    pub items: Vec<GainerItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeFeed {
    pub title: String,
    pub source_url: String,
    pub date: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Gainers,
    Themes,
}

impl FeedKind {
    pub fn label(&self) -> &'static str {
        match self {
            FeedKind::Gainers => "gainers",
            FeedKind::Themes => "themes",
        }
    }
}
