use crate::store::atomic::write_atomic_file;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

const SESSION_VERSION: u32 = 2;

/// Durable client-side storage holding one serialized value (the expanded-code set).
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;

    fn save(&self, raw: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read {}", self.path.display()))
            }
        }
    }

    fn save(&self, raw: &str) -> Result<()> {
        write_atomic_file(&self.path, raw.as_bytes())
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.raw())
    }

    fn save(&self, raw: &str) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw.to_string());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct PersistedSession<'a> {
    version: u32,
    expanded: Vec<&'a str>,
}

pub fn encode_expanded(codes: &BTreeSet<String>) -> Result<String> {
    serde_json::to_string(&PersistedSession {
        version: SESSION_VERSION,
        expanded: codes.iter().map(String::as_str).collect(),
    })
    .context("failed to serialize chart session")
}

/// Reads every shape this value has had:
/// - `{"version": 2, "expanded": ["005930", ...]}`
/// - `{"005930": true, "000660": false}` (per-code flags; only `true` counts)
/// - `["005930", ...]`
///
/// Unknown fields and non-string entries are ignored. `None` means the value is unusable.
pub fn decode_expanded(raw: &str) -> Option<BTreeSet<String>> {
    let value = serde_json::from_str::<Value>(raw).ok()?;
    let codes: Vec<String> = match value {
        Value::Array(items) => string_items(items),
        Value::Object(mut map) => match map.remove("expanded") {
            Some(Value::Array(items)) => string_items(items),
            Some(_) => return None,
            None if map.contains_key("version") => Vec::new(),
            None => map
                .into_iter()
                .filter(|(_, v)| v.as_bool() == Some(true))
                .map(|(k, _)| k)
                .collect(),
        },
        _ => return None,
    };

    Some(
        codes
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
    )
}

fn string_items(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// Loads the persisted set, treating absent, unreadable and malformed state as empty.
pub fn load_expanded(store: &dyn SessionStore) -> BTreeSet<String> {
    let raw = match store.load() {
        Ok(Some(raw)) => raw,
        Ok(None) => return BTreeSet::new(),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "chart session unreadable; starting empty");
            return BTreeSet::new();
        }
    };

    decode_expanded(&raw).unwrap_or_else(|| {
        tracing::warn!("chart session malformed; starting empty");
        BTreeSet::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn reads_current_shape() {
        let raw = r#"{"version": 2, "expanded": ["005930", "000660"], "theme": "dark"}"#;
        assert_eq!(decode_expanded(raw), Some(set(&["000660", "005930"])));
    }

    #[test]
    fn reads_legacy_flag_map() {
        let raw = r#"{"005930": true, "000660": false, "086520": true}"#;
        assert_eq!(decode_expanded(raw), Some(set(&["005930", "086520"])));
    }

    #[test]
    fn reads_bare_array_and_skips_junk_entries() {
        let raw = r#"["005930", 42, null, " ", "000660"]"#;
        assert_eq!(decode_expanded(raw), Some(set(&["005930", "000660"])));
    }

    #[test]
    fn future_version_without_expanded_is_empty() {
        assert_eq!(decode_expanded(r#"{"version": 3, "panels": {}}"#), Some(set(&[])));
    }

    #[test]
    fn garbage_is_unusable() {
        assert_eq!(decode_expanded("{"), None);
        assert_eq!(decode_expanded("\"005930\""), None);
        assert_eq!(decode_expanded(r#"{"expanded": "005930"}"#), None);
    }

    #[test]
    fn encoded_value_decodes_to_same_set() {
        let codes = set(&["005930", "000660"]);
        let raw = encode_expanded(&codes).unwrap();
        assert!(raw.contains("\"version\":2"));
        assert_eq!(decode_expanded(&raw), Some(codes));
    }

    #[test]
    fn malformed_store_loads_empty() {
        let store = MemorySessionStore::with_raw("not json at all");
        assert!(load_expanded(&store).is_empty());
        assert!(load_expanded(&MemorySessionStore::default()).is_empty());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/chart_session.json");

        let store = FileSessionStore::new(&path);
        assert_eq!(store.load().unwrap(), None);
        store.save(&encode_expanded(&set(&["005930"])).unwrap()).unwrap();

        let reopened = FileSessionStore::new(&path);
        assert_eq!(load_expanded(&reopened), set(&["005930"]));
    }
}
