// User preferences stored through the injected key-value store

use serde::{Deserialize, Serialize};

use super::database::{StorageError, StorageResult};
use super::kv::KeyValueStore;

const LOCALE_KEY: &str = "locale";
const PAGE_SIZE_KEY: &str = "default_page_size";

pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClipSettings {
    pub locale: String,
    pub default_page_size: u32,
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsInput {
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub default_page_size: Option<u32>,
}

/// Get the stored locale, falling back to the default
pub fn get_locale(store: &dyn KeyValueStore) -> StorageResult<String> {
    Ok(store
        .get(LOCALE_KEY)?
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string()))
}

fn validate_locale(locale: &str) -> StorageResult<&str> {
    let locale = locale.trim();
    if locale.is_empty() {
        return Err(StorageError::validation("Locale must not be empty"));
    }
    Ok(locale)
}

fn validate_page_size(page_size: u32) -> StorageResult<u32> {
    if page_size == 0 {
        return Err(StorageError::validation("Page size must be at least 1"));
    }
    Ok(page_size)
}

pub fn set_locale(store: &dyn KeyValueStore, locale: &str) -> StorageResult<()> {
    store.set(LOCALE_KEY, validate_locale(locale)?)
}

/// Get the default page size, falling back to `fallback` when unset or unreadable
pub fn get_default_page_size(store: &dyn KeyValueStore, fallback: u32) -> StorageResult<u32> {
    let value = store.get(PAGE_SIZE_KEY)?;
    Ok(value
        .and_then(|v| v.parse().ok())
        .filter(|size| *size > 0)
        .unwrap_or(fallback))
}

pub fn get_settings(
    store: &dyn KeyValueStore,
    fallback_page_size: u32,
) -> StorageResult<ClipSettings> {
    Ok(ClipSettings {
        locale: get_locale(store)?,
        default_page_size: get_default_page_size(store, fallback_page_size)?,
    })
}

/// Apply a partial settings update and return the result
pub fn update_settings(
    store: &dyn KeyValueStore,
    input: UpdateSettingsInput,
    fallback_page_size: u32,
) -> StorageResult<ClipSettings> {
    // Reject the whole update before anything is written
    let locale = input.locale.as_deref().map(validate_locale).transpose()?;
    let page_size = input.default_page_size.map(validate_page_size).transpose()?;

    if let Some(locale) = locale {
        store.set(LOCALE_KEY, locale)?;
    }
    if let Some(page_size) = page_size {
        store.set(PAGE_SIZE_KEY, &page_size.to_string())?;
    }
    get_settings(store, fallback_page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::MemoryKeyValueStore;

    #[test]
    fn test_defaults_when_unset() {
        let store = MemoryKeyValueStore::new();
        let settings = get_settings(&store, DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(settings, ClipSettings::default());
    }

    #[test]
    fn test_partial_update() {
        let store = MemoryKeyValueStore::new();

        let settings = update_settings(
            &store,
            UpdateSettingsInput {
                locale: Some("zh-CN".to_string()),
                default_page_size: None,
            },
            DEFAULT_PAGE_SIZE,
        )
        .unwrap();
        assert_eq!(settings.locale, "zh-CN");
        assert_eq!(settings.default_page_size, DEFAULT_PAGE_SIZE);

        let settings = update_settings(
            &store,
            UpdateSettingsInput {
                locale: None,
                default_page_size: Some(50),
            },
            DEFAULT_PAGE_SIZE,
        )
        .unwrap();
        assert_eq!(settings.locale, "zh-CN");
        assert_eq!(settings.default_page_size, 50);
    }

    #[test]
    fn test_invalid_values() {
        let store = MemoryKeyValueStore::new();

        assert!(set_locale(&store, "  ").is_err());
        assert!(update_settings(
            &store,
            UpdateSettingsInput {
                locale: None,
                default_page_size: Some(0),
            },
            DEFAULT_PAGE_SIZE,
        )
        .is_err());

        // A rejected field leaves every setting as it was
        assert!(update_settings(
            &store,
            UpdateSettingsInput {
                locale: Some("fr".to_string()),
                default_page_size: Some(0),
            },
            DEFAULT_PAGE_SIZE,
        )
        .is_err());
        assert_eq!(
            get_settings(&store, DEFAULT_PAGE_SIZE).unwrap(),
            ClipSettings::default()
        );

        // A corrupt stored value falls back instead of failing
        store.set(PAGE_SIZE_KEY, "lots").unwrap();
        assert_eq!(get_default_page_size(&store, 30).unwrap(), 30);
    }
}
