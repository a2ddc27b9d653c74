//! Administrator key/value settings.
//!
//! Staff enter flat records (`key`, `value`, optional locale) through the
//! admin. [`merge_entries`] folds them into the nested
//! [`StaffConfigurations`] map the site service reads, and pulls
//! `banner_<slot>_<field>` keys out into up to four front-page banners.
//!
//! ```text
//! donate_url          = "https://…"          → "donate_url": "https://…"
//! about (en)          = "Hello"              → "about": {"en": "Hello",
//! about (fr)          = "Bonjour"                        "fr": "Bonjour"}
//! banner_2_image      = "/b.png"             → banner slot 2
//! banner_2_hide_title = "True"               →   hide_title: true
//! ```
//!
//! A key is either scalar or localized, never both: the record processed
//! last decides the shape and replaces whatever was there.

use crate::outcome::SkipReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of banner slots on the front page.
pub const BANNER_SLOTS: usize = 4;

/// Banner fields whose values are coerced to booleans.
const BOOLEAN_BANNER_FIELDS: &[&str] = &["hide_title", "ajax"];

const BANNER_PREFIX: &str = "banner_";

/// One administrator-entered setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub is_localized: bool,
    #[serde(default)]
    pub locale: Option<String>,
}

impl ConfigEntry {
    pub fn scalar(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: Some(value.to_string()),
            is_localized: false,
            locale: None,
        }
    }

    pub fn localized(key: &str, locale: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: Some(value.to_string()),
            is_localized: true,
            locale: Some(locale.to_string()),
        }
    }
}

/// A merged setting: plain text or one value per locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Text(String),
    Localized(BTreeMap<String, String>),
}

impl SettingValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            SettingValue::Localized(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SettingValue::Text(s) => serde_json::Value::String(s.clone()),
            SettingValue::Localized(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            ),
        }
    }
}

/// Merged administrator settings, keyed by setting name.
pub type StaffConfigurations = BTreeMap<String, SettingValue>;

/// A banner field value: booleans for known flags, text otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BannerValue {
    Bool(bool),
    Text(String),
}

impl BannerValue {
    fn coerce(field: &str, raw: &str) -> Self {
        if !BOOLEAN_BANNER_FIELDS.contains(&field) {
            return BannerValue::Text(raw.to_string());
        }
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => BannerValue::Bool(true),
            "false" | "0" | "no" | "off" => BannerValue::Bool(false),
            _ => BannerValue::Text(raw.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BannerValue::Text(s) => Some(s),
            BannerValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self, BannerValue::Bool(true))
    }
}

/// A complete front-page banner from one `banner_<slot>_*` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerEntry {
    /// 1-based slot index.
    pub slot: usize,
    pub fields: BTreeMap<String, BannerValue>,
}

impl BannerEntry {
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(BannerValue::as_text)
            .filter(|s| !s.is_empty())
    }

    pub fn flag(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(BannerValue::as_bool)
    }

    fn is_complete(fields: &BTreeMap<String, BannerValue>) -> bool {
        ["image", "title", "url"].iter().all(|f| {
            fields
                .get(*f)
                .and_then(BannerValue::as_text)
                .is_some_and(|s| !s.is_empty())
        })
    }
}

/// Result of [`merge_entries`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedEntries {
    pub settings: StaffConfigurations,
    /// Complete banners in slot order.
    pub banners: Vec<BannerEntry>,
    /// Records that could not be routed (bad banner slot, locale missing).
    pub rejected: Vec<(String, SkipReason)>,
}

/// Parse `banner_<slot>_<field>` into a 1-based slot and field name.
fn parse_banner_key(key: &str) -> Option<(usize, &str)> {
    let rest = key.strip_prefix(BANNER_PREFIX)?;
    let (slot, field) = rest.split_once('_')?;
    let slot: usize = slot.parse().ok()?;
    if (1..=BANNER_SLOTS).contains(&slot) && !field.is_empty() {
        Some((slot, field))
    } else {
        None
    }
}

/// Fold flat records into nested settings and complete banners.
///
/// Records with a missing or empty value are dropped. Incomplete banner
/// slots (missing any of `image`, `title`, `url`) are dropped silently.
pub fn merge_entries<'a>(entries: impl IntoIterator<Item = &'a ConfigEntry>) -> MergedEntries {
    let mut merged = MergedEntries::default();
    let mut slots: [BTreeMap<String, BannerValue>; BANNER_SLOTS] = Default::default();

    for entry in entries {
        let value = match entry.value.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => continue,
        };

        if entry.key.starts_with(BANNER_PREFIX) {
            match parse_banner_key(&entry.key) {
                Some((slot, field)) => {
                    slots[slot - 1].insert(field.to_string(), BannerValue::coerce(field, value));
                }
                None => {
                    tracing::warn!("ignoring malformed banner key '{}'", entry.key);
                    merged
                        .rejected
                        .push((entry.key.clone(), SkipReason::InvalidKey(entry.key.clone())));
                }
            }
            continue;
        }

        if entry.is_localized {
            let Some(locale) = entry.locale.as_deref().filter(|l| !l.is_empty()) else {
                tracing::warn!("localized setting '{}' has no locale", entry.key);
                merged.rejected.push((
                    entry.key.clone(),
                    SkipReason::InvalidKey(format!("{} has no locale", entry.key)),
                ));
                continue;
            };
            let slot = merged
                .settings
                .entry(entry.key.clone())
                .or_insert_with(|| SettingValue::Localized(BTreeMap::new()));
            if let SettingValue::Text(_) = *slot {
                *slot = SettingValue::Localized(BTreeMap::new());
            }
            if let SettingValue::Localized(map) = slot {
                map.insert(locale.to_string(), value.to_string());
            }
        } else {
            merged
                .settings
                .insert(entry.key.clone(), SettingValue::Text(value.to_string()));
        }
    }

    merged.banners = slots
        .into_iter()
        .enumerate()
        .filter(|(_, fields)| BannerEntry::is_complete(fields))
        .map(|(i, fields)| BannerEntry { slot: i + 1, fields })
        .collect();

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: Option<&str>, locale: Option<&str>) -> ConfigEntry {
        ConfigEntry {
            key: key.to_string(),
            value: value.map(String::from),
            is_localized: locale.is_some(),
            locale: locale.map(String::from),
        }
    }

    // =========================================================================
    // Settings
    // =========================================================================

    #[test]
    fn localized_key_collapses_into_locale_map() {
        let entries = vec![
            entry("x", Some("1"), None),
            entry("x", Some("2"), Some("en")),
            entry("x", Some("3"), Some("fr")),
        ];
        let merged = merge_entries(&entries);

        let expected: BTreeMap<String, String> = [("en", "2"), ("fr", "3")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(merged.settings["x"], SettingValue::Localized(expected));
    }

    #[test]
    fn scalar_after_localized_replaces_map() {
        let entries = vec![
            entry("x", Some("2"), Some("en")),
            entry("x", Some("plain"), None),
        ];
        let merged = merge_entries(&entries);
        assert_eq!(merged.settings["x"], SettingValue::Text("plain".into()));
    }

    #[test]
    fn empty_and_null_values_dropped() {
        let entries = vec![
            entry("a", None, None),
            entry("b", Some(""), None),
            entry("c", Some("kept"), None),
        ];
        let merged = merge_entries(&entries);
        assert_eq!(merged.settings.len(), 1);
        assert_eq!(merged.settings["c"].as_text(), Some("kept"));
    }

    #[test]
    fn localized_without_locale_is_rejected() {
        let entries = vec![ConfigEntry {
            key: "about".into(),
            value: Some("hi".into()),
            is_localized: true,
            locale: None,
        }];
        let merged = merge_entries(&entries);
        assert!(merged.settings.is_empty());
        assert_eq!(merged.rejected.len(), 1);
    }

    #[test]
    fn setting_value_serializes_untagged() {
        let text = SettingValue::Text("v".into());
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"v\"");
        let json = serde_json::json!({"en": "a"});
        let back: SettingValue = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back.to_json(), json);
    }

    // =========================================================================
    // Banners
    // =========================================================================

    fn banner(slot: usize, fields: &[(&str, &str)]) -> Vec<ConfigEntry> {
        fields
            .iter()
            .map(|(f, v)| ConfigEntry::scalar(&format!("banner_{slot}_{f}"), v))
            .collect()
    }

    #[test]
    fn banner_without_url_excluded() {
        let entries = banner(1, &[("image", "/a.png"), ("title", "Hi")]);
        assert!(merge_entries(&entries).banners.is_empty());

        let mut entries = entries;
        entries.push(ConfigEntry::scalar("banner_1_url", "/news"));
        let merged = merge_entries(&entries);
        assert_eq!(merged.banners.len(), 1);
        assert_eq!(merged.banners[0].text("url"), Some("/news"));
    }

    #[test]
    fn banners_emitted_in_slot_order() {
        let mut entries = banner(3, &[("image", "c"), ("title", "C"), ("url", "/c")]);
        entries.extend(banner(1, &[("image", "a"), ("title", "A"), ("url", "/a")]));
        entries.extend(banner(2, &[("image", "b"), ("title", "B")]));

        let merged = merge_entries(&entries);
        let slots: Vec<usize> = merged.banners.iter().map(|b| b.slot).collect();
        assert_eq!(slots, vec![1, 3]);
    }

    #[test]
    fn banner_keys_stay_out_of_settings() {
        let entries = banner(1, &[("image", "a"), ("title", "A"), ("url", "/a")]);
        assert!(merge_entries(&entries).settings.is_empty());
    }

    #[test]
    fn banner_boolean_fields_coerced() {
        let entries = banner(
            2,
            &[
                ("image", "b"),
                ("title", "B"),
                ("url", "/b"),
                ("hide_title", "True"),
                ("ajax", "0"),
                ("css_classes", "True"),
            ],
        );
        let merged = merge_entries(&entries);
        let b = &merged.banners[0];
        assert!(b.flag("hide_title"));
        assert_eq!(b.fields["ajax"], BannerValue::Bool(false));
        assert_eq!(b.text("css_classes"), Some("True"));
    }

    #[test]
    fn banner_multi_word_field_name() {
        let entries = banner(
            4,
            &[("image", "d"), ("title", "D"), ("url", "/d"), ("css_classes", "x y")],
        );
        let merged = merge_entries(&entries);
        assert_eq!(merged.banners[0].text("css_classes"), Some("x y"));
    }

    #[test]
    fn banner_slot_out_of_range_rejected() {
        let entries = vec![
            ConfigEntry::scalar("banner_5_image", "e"),
            ConfigEntry::scalar("banner_x_image", "e"),
        ];
        let merged = merge_entries(&entries);
        assert!(merged.banners.is_empty());
        assert_eq!(merged.rejected.len(), 2);
    }
}
