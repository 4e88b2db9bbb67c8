// Locale message cache, owned by whoever initializes it
// Messages are reloaded only when the active locale changes

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::storage::settings;
use crate::storage::{KeyValueStore, StorageError};

#[derive(Error, Debug)]
pub enum I18nError {
    #[error("No messages for locale: {0}")]
    MissingLocale(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse messages: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Messages = HashMap<String, String>;

/// Source of message tables
pub trait MessageLoader {
    fn load(&self, locale: &str) -> Result<Messages, I18nError>;
}

#[derive(Debug, Deserialize)]
struct MessageEntry {
    message: String,
}

/// Loads `<root>/<locale>/messages.json` in the extension `_locales` layout,
/// where each key maps to `{ "message": "..." }`.
///
/// `zh-CN` is looked up as `zh_CN`, then as `zh`.
#[derive(Debug, Clone)]
pub struct LocaleDirLoader {
    root: PathBuf,
}

impl LocaleDirLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn candidates(locale: &str) -> Vec<String> {
        let normalized = locale.replace('-', "_");
        let mut candidates = vec![normalized.clone()];
        if let Some((language, _)) = normalized.split_once('_') {
            candidates.push(language.to_string());
        }
        candidates
    }
}

impl MessageLoader for LocaleDirLoader {
    fn load(&self, locale: &str) -> Result<Messages, I18nError> {
        for candidate in Self::candidates(locale) {
            let path = self.root.join(&candidate).join("messages.json");
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let entries: HashMap<String, MessageEntry> = serde_json::from_str(&content)?;
            return Ok(entries.into_iter().map(|(k, v)| (k, v.message)).collect());
        }
        Err(I18nError::MissingLocale(locale.to_string()))
    }
}

pub struct MessageCache<L: MessageLoader> {
    loader: L,
    locale: Option<String>,
    messages: Messages,
}

impl<L: MessageLoader> MessageCache<L> {
    /// Empty cache; nothing is loaded until a locale is set
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            locale: None,
            messages: Messages::new(),
        }
    }

    /// Cache primed with the locale persisted in `store`
    pub fn from_store(loader: L, store: &dyn KeyValueStore) -> Result<Self, I18nError> {
        let mut cache = Self::new(loader);
        let locale = settings::get_locale(store)?;
        cache.set_locale(&locale)?;
        Ok(cache)
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Switch locale. Returns true if messages were reloaded.
    /// On load failure the previous locale and messages stay in place.
    pub fn set_locale(&mut self, locale: &str) -> Result<bool, I18nError> {
        if self.locale.as_deref() == Some(locale) {
            return Ok(false);
        }

        let messages = self.loader.load(locale)?;
        debug!(locale, count = messages.len(), "Loaded locale messages");
        self.messages = messages;
        self.locale = Some(locale.to_string());
        Ok(true)
    }

    /// Switch locale and persist the choice
    pub fn change_locale(
        &mut self,
        locale: &str,
        store: &dyn KeyValueStore,
    ) -> Result<bool, I18nError> {
        let reloaded = self.set_locale(locale)?;
        settings::set_locale(store, locale)?;
        Ok(reloaded)
    }

    /// Drop cached messages; the next `set_locale` reloads
    pub fn invalidate(&mut self) {
        self.locale = None;
        self.messages.clear();
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.messages.get(key).map(String::as_str)
    }

    /// Message for `key`, or the key itself when missing
    pub fn text(&self, key: &str) -> String {
        self.get(key).unwrap_or(key).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct CountingLoader {
        loads: Cell<usize>,
    }

    impl MessageLoader for CountingLoader {
        fn load(&self, locale: &str) -> Result<Messages, I18nError> {
            self.loads.set(self.loads.get() + 1);
            match locale {
                "en" => Ok(Messages::from([("save".to_string(), "Save".to_string())])),
                "fr" => Ok(Messages::from([("save".to_string(), "Enregistrer".to_string())])),
                other => Err(I18nError::MissingLocale(other.to_string())),
            }
        }
    }

    fn counting() -> CountingLoader {
        CountingLoader { loads: Cell::new(0) }
    }

    #[test]
    fn test_reload_only_on_locale_change() {
        let mut cache = MessageCache::new(counting());

        assert!(cache.set_locale("en").unwrap());
        assert!(!cache.set_locale("en").unwrap());
        assert_eq!(cache.loader.loads.get(), 1);
        assert_eq!(cache.text("save"), "Save");

        assert!(cache.set_locale("fr").unwrap());
        assert_eq!(cache.text("save"), "Enregistrer");
        assert_eq!(cache.text("unknown.key"), "unknown.key");

        cache.invalidate();
        assert_eq!(cache.get("save"), None);
        assert!(cache.set_locale("fr").unwrap());
        assert_eq!(cache.loader.loads.get(), 3);
    }

    #[test]
    fn test_failed_load_keeps_previous_locale() {
        let mut cache = MessageCache::new(counting());
        cache.set_locale("en").unwrap();

        assert!(matches!(cache.set_locale("xx"), Err(I18nError::MissingLocale(_))));
        assert_eq!(cache.locale(), Some("en"));
        assert_eq!(cache.text("save"), "Save");
    }

    #[test]
    fn test_locale_persisted_in_store() {
        let store = MemoryKeyValueStore::new();

        let mut cache = MessageCache::from_store(counting(), &store).unwrap();
        assert_eq!(cache.locale(), Some("en"));

        cache.change_locale("fr", &store).unwrap();
        let reopened = MessageCache::from_store(counting(), &store).unwrap();
        assert_eq!(reopened.locale(), Some("fr"));
    }

    #[test]
    fn test_locale_dir_loader() {
        let dir = TempDir::new().unwrap();
        let zh = dir.path().join("zh");
        std::fs::create_dir_all(&zh).unwrap();
        std::fs::write(
            zh.join("messages.json"),
            r#"{ "save": { "message": "保存", "description": "Save button" } }"#,
        )
        .unwrap();

        let loader = LocaleDirLoader::new(dir.path());
        let messages = loader.load("zh-CN").unwrap();
        assert_eq!(messages.get("save").map(String::as_str), Some("保存"));

        assert!(matches!(loader.load("de"), Err(I18nError::MissingLocale(_))));
    }
}
