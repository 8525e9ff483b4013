use crate::domain::{GainerFeed, GainerItem, ResolvedSnapshot, SnapshotDate, ThemeFeed};
use serde::Serialize;

pub const EMPTY_SECTION_MESSAGE: &str = "데이터가 없습니다.";
const QUOTE_PAGE_URL: &str = "https://finance.naver.com/item/main.naver?code=";

/// Merges the two feeds of a resolved date. Both absent still keeps the date: the page shows
/// "no data for this date" rather than skipping it.
pub fn build(
    date: SnapshotDate,
    gainers: Option<GainerFeed>,
    themes: Option<ThemeFeed>,
) -> ResolvedSnapshot {
    ResolvedSnapshot {
        date: Some(date),
        gainers: gainers.map(|feed| feed.items).unwrap_or_default(),
        theme_body: themes.map(|feed| feed.body).unwrap_or_default(),
    }
}

/// Strips everything but digits and regroups with thousands separators. Input that does not
/// reduce to an integer is returned unchanged.
pub fn format_price(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let Ok(value) = digits.parse::<u64>() else {
        return raw.to_string();
    };

    let plain = value.to_string();
    let mut out = String::with_capacity(plain.len() + plain.len() / 3);
    for (i, ch) in plain.chars().enumerate() {
        if i > 0 && (plain.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeDirection {
    Up,
    Down,
    Neutral,
}

impl ChangeDirection {
    pub fn classify(change: Option<&str>) -> Self {
        match change.map(str::trim_start).and_then(|s| s.chars().next()) {
            Some('+') => ChangeDirection::Up,
            Some('-') => ChangeDirection::Down,
            _ => ChangeDirection::Neutral,
        }
    }

    pub fn arrow(&self) -> Option<&'static str> {
        match self {
            ChangeDirection::Up => Some("▲"),
            ChangeDirection::Down => Some("▼"),
            ChangeDirection::Neutral => None,
        }
    }
}

/// Presentation-only identity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    Recognized,
}

impl Viewer {
    pub fn from_identity(identity: Option<&str>) -> Self {
        match identity.map(str::trim) {
            Some(id) if !id.is_empty() && !id.eq_ignore_ascii_case("anonymous") => {
                Viewer::Recognized
            }
            _ => Viewer::Anonymous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GainerRow {
    pub name: String,
    pub code: String,
    pub price: Option<String>,
    pub change: Option<String>,
    pub direction: ChangeDirection,
    pub arrow: Option<&'static str>,
    pub reason: String,
    pub market_cap: Option<String>,
    pub trading_value: Option<String>,
    pub quote_url: String,
}

impl GainerRow {
    pub fn from_item(item: &GainerItem) -> Self {
        let direction = ChangeDirection::classify(item.change.as_deref());
        Self {
            name: item.name.clone(),
            code: item.code.clone(),
            price: item.price.as_deref().map(format_price),
            change: item.change.clone(),
            direction,
            arrow: direction.arrow(),
            reason: item.reason.clone(),
            market_cap: item.market_cap.clone(),
            trading_value: item.trading_value.clone(),
            quote_url: format!("{QUOTE_PAGE_URL}{}", item.code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GainerSection {
    pub rows: Vec<GainerRow>,
    pub empty_message: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSection {
    pub body: String,
    pub empty_message: Option<&'static str>,
}

/// Renderable page model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestView {
    pub date: Option<SnapshotDate>,
    pub heading: String,
    pub notice: Option<String>,
    pub gainers: GainerSection,
    pub themes: ThemeSection,
    pub show_sign_out: bool,
}

impl DigestView {
    pub fn render(snapshot: &ResolvedSnapshot, notice: Option<String>, viewer: Viewer) -> Self {
        let heading = match snapshot.date {
            Some(date) => format!("{date} 장 마감 브리핑"),
            None => "장 마감 브리핑".to_string(),
        };

        let rows: Vec<GainerRow> = snapshot.gainers.iter().map(GainerRow::from_item).collect();
        let gainers_empty = rows.is_empty();
        let body = snapshot.theme_body.trim().to_string();
        let themes_empty = body.is_empty();

        Self {
            date: snapshot.date,
            heading,
            notice,
            gainers: GainerSection {
                rows,
                empty_message: gainers_empty.then_some(EMPTY_SECTION_MESSAGE),
            },
            themes: ThemeSection {
                body,
                empty_message: themes_empty.then_some(EMPTY_SECTION_MESSAGE),
            },
            show_sign_out: viewer == Viewer::Recognized,
        }
    }
}
