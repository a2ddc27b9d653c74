//! Generator configuration.
//!
//! Handles loading, validating, and merging `settings-gen.toml`. Stock
//! defaults cover every option; the user file only overrides what it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! languages = ["en"]                  # Locales titles are rendered in
//! output = "generated_settings.txt"   # Settings artifact path
//! map_output = "map.html"             # Map page artifact path
//! debug = false                       # Recompute share images every run
//!
//! [share_images]
//! images_per_share_image = 9
//! per_line = 3
//! tile_size = 200
//! max_age_days = 7
//! max_items = 100
//! media_root = "media"
//! output_dir = "media/share"
//! public_prefix = "/media/share/"
//!
//! [birthdays]
//! days_before = 1
//! days_after = 12
//! max_usernames = 4
//! user_image = "static/img/birthday.png"
//! user_listing_path = "/users/"
//! user_listing_ordering = "preferences___cache_reputation"
//!
//! [seasons]
//! available_settings = ["site_logo", "site_nav_logo", "index_image", "css_classes", "corner_popup"]
//! staff_configurations_settings = ["site_logo", "index_image"]
//! ends_within_days = 1
//!
//! [seasons.campaigns.christmas]
//! start_date = "12-01"
//! end_date = "12-31"
//! staff_configurations_settings = ["corner_popup"]
//! settings = { site_logo = "img/logo_christmas.png" }
//!
//! [map]
//! static_url = "/"
//! static_version = "1"
//! default_icon = "static/img/default_map_icon.png"
//! zoom = 2
//! location_search_path = "/users/"
//!
//! [translations.fr]
//! months = ["janvier", …, "décembre"]
//! month_day_format = "{day} {month}"
//! messages = { "Happy Birthday" = "Joyeux anniversaire" }
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::date_window::{BirthdayWindow, EndedRecentlyPolicy, MonthDay};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Generator configuration loaded from `settings-gen.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Locales every announcement title is rendered in.
    pub languages: Vec<String>,
    /// Path of the generated settings artifact.
    pub output: String,
    /// Path of the generated map page.
    pub map_output: String,
    /// Recompute share images on every run instead of weekly.
    pub debug: bool,
    pub share_images: ShareImagesConfig,
    pub birthdays: BirthdaysConfig,
    pub seasons: SeasonsConfig,
    pub map: MapConfig,
    /// Month names, date format and message translations per locale.
    pub translations: BTreeMap<String, TranslationTable>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            output: "generated_settings.txt".to_string(),
            map_output: "map.html".to_string(),
            debug: false,
            share_images: ShareImagesConfig::default(),
            birthdays: BirthdaysConfig::default(),
            seasons: SeasonsConfig::default(),
            map: MapConfig::default(),
            translations: BTreeMap::from([("en".to_string(), TranslationTable::english())]),
        }
    }
}

impl GeneratorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.languages.is_empty() {
            return Err(ConfigError::Validation(
                "languages must not be empty".into(),
            ));
        }
        let share = &self.share_images;
        if share.images_per_share_image == 0 || share.per_line == 0 || share.tile_size == 0 {
            return Err(ConfigError::Validation(
                "share_images.images_per_share_image, per_line and tile_size must be non-zero"
                    .into(),
            ));
        }
        if share.max_age_days < 0 {
            return Err(ConfigError::Validation(
                "share_images.max_age_days must not be negative".into(),
            ));
        }
        if let Some(missing) = self
            .languages
            .iter()
            .find(|l| !self.translations.contains_key(l.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "language '{missing}' has no [translations.{missing}] table"
            )));
        }
        for (locale, table) in &self.translations {
            if table.months.len() != 12 {
                return Err(ConfigError::Validation(format!(
                    "translations.{locale}.months must list 12 month names, found {}",
                    table.months.len()
                )));
            }
        }
        Ok(())
    }
}

/// Weekly share-image generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShareImagesConfig {
    /// Tiles in one composite.
    pub images_per_share_image: usize,
    /// Tiles per grid row.
    pub per_line: u32,
    /// Edge length of a square tile, in pixels.
    pub tile_size: u32,
    /// Cached composites older than this are regenerated.
    pub max_age_days: i64,
    /// Items inspected per collection when looking for images.
    pub max_items: usize,
    /// Directory image references are resolved against.
    pub media_root: String,
    /// Directory composites are written to.
    pub output_dir: String,
    /// URL prefix under which `output_dir` is served.
    pub public_prefix: String,
}

impl Default for ShareImagesConfig {
    fn default() -> Self {
        Self {
            images_per_share_image: 9,
            per_line: 3,
            tile_size: 200,
            max_age_days: 7,
            max_items: 100,
            media_root: "media".to_string(),
            output_dir: "media/share".to_string(),
            public_prefix: "/media/share/".to_string(),
        }
    }
}

/// Birthday announcement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BirthdaysConfig {
    pub days_before: u32,
    pub days_after: u32,
    /// Usernames listed before collapsing the rest into "+ N".
    pub max_usernames: usize,
    /// Image shown on the user birthday announcement.
    pub user_image: String,
    /// Listing page used when several users share a birthday.
    pub user_listing_path: String,
    /// `ordering` query parameter of that listing.
    pub user_listing_ordering: String,
}

impl Default for BirthdaysConfig {
    fn default() -> Self {
        Self {
            days_before: 1,
            days_after: 12,
            max_usernames: 4,
            user_image: "static/img/birthday.png".to_string(),
            user_listing_path: "/users/".to_string(),
            user_listing_ordering: "preferences___cache_reputation".to_string(),
        }
    }
}

impl BirthdaysConfig {
    pub fn window(&self) -> BirthdayWindow {
        BirthdayWindow {
            days_before: self.days_before,
            days_after: self.days_after,
        }
    }
}

/// Seasonal campaign definitions and override rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeasonsConfig {
    /// Campaign attributes copied into the snapshot when declared.
    pub available_settings: Vec<String>,
    /// Variables staff may override for every campaign.
    pub staff_configurations_settings: Vec<String>,
    /// Days after its end a campaign still counts as live.
    pub ends_within_days: u32,
    pub campaigns: BTreeMap<String, Campaign>,
}

impl Default for SeasonsConfig {
    fn default() -> Self {
        Self {
            available_settings: [
                "site_logo",
                "site_nav_logo",
                "index_image",
                "css_classes",
                "corner_popup",
                "profile_background",
                "js_variables",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            staff_configurations_settings: ["site_logo", "index_image", "corner_popup"]
                .into_iter()
                .map(String::from)
                .collect(),
            ends_within_days: 1,
            campaigns: BTreeMap::new(),
        }
    }
}

impl SeasonsConfig {
    pub fn ended_recently(&self) -> EndedRecentlyPolicy {
        EndedRecentlyPolicy {
            ends_within: self.ends_within_days,
        }
    }
}

/// A yearly campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Campaign {
    pub start_date: MonthDay,
    pub end_date: MonthDay,
    /// Extra variables staff may override for this campaign only.
    #[serde(default)]
    pub staff_configurations_settings: Vec<String>,
    /// Static attributes of the campaign.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

/// Map page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    pub static_url: String,
    /// Appended to static asset URLs for cache busting.
    pub static_version: String,
    /// Marker icon for users without a favorite character image.
    pub default_icon: String,
    /// Initial map center as `[latitude, longitude]`.
    pub center: [f64; 2],
    pub zoom: u32,
    /// User search page; each marker links to `<path>?location=<location>`.
    pub location_search_path: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            static_url: "/".to_string(),
            static_version: "1".to_string(),
            default_icon: "static/img/default_map_icon.png".to_string(),
            center: [30.0, 0.0],
            zoom: 2,
            location_search_path: "/users/".to_string(),
        }
    }
}

/// Locale data for one language.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslationTable {
    /// Month names, January first.
    pub months: Vec<String>,
    /// Month-day pattern with `{month}` and `{day}` placeholders.
    pub month_day_format: String,
    /// Message id → translated text. Missing ids fall back to the id.
    pub messages: BTreeMap<String, String>,
}

impl TranslationTable {
    pub fn english() -> Self {
        Self {
            months: [
                "January",
                "February",
                "March",
                "April",
                "May",
                "June",
                "July",
                "August",
                "September",
                "October",
                "November",
                "December",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            month_day_format: "{month} {day}".to_string(),
            messages: BTreeMap::new(),
        }
    }
}

impl Default for TranslationTable {
    fn default() -> Self {
        Self::english()
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(GeneratorConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<GeneratorConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GeneratorConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
///
/// A missing file yields the stock defaults; an invalid one is an error.
pub fn load_config(path: &Path) -> Result<GeneratorConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("no config at {}, using defaults", path.display());
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(overlay))
}

/// Returns a fully-commented stock `settings-gen.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# settings-gen configuration
# ==========================
#
# Every option is optional; the values below are the defaults.

# Locales announcement titles are rendered in. Each needs a
# [translations.<locale>] table unless it is "en".
languages = ["en"]

# Where the settings artifact and the map page are written.
output = "generated_settings.txt"
map_output = "map.html"

# Regenerate share images on every run instead of once a week.
debug = false

[share_images]
# Composite layout: 9 tiles of 200px, 3 per row.
images_per_share_image = 9
per_line = 3
tile_size = 200
# Composites older than this many days are regenerated.
max_age_days = 7
# Items inspected per collection when looking for images.
max_items = 100
# Image references are resolved against media_root; composites are
# written to output_dir and published under public_prefix.
media_root = "media"
output_dir = "media/share"
public_prefix = "/media/share/"

[birthdays]
# A character birthday is announced from 12 days before it comes up
# until 1 day after it has passed.
days_before = 1
days_after = 12
# User birthdays list at most this many names, then "+ N".
max_usernames = 4
user_image = "static/img/birthday.png"
# Several users born today link to this listing, sorted by this field.
user_listing_path = "/users/"
user_listing_ordering = "preferences___cache_reputation"

[seasons]
# Campaign attributes copied into SEASONAL_SETTINGS when present.
available_settings = [
    "site_logo",
    "site_nav_logo",
    "index_image",
    "css_classes",
    "corner_popup",
    "profile_background",
    "js_variables",
]
# Variables staff can override with a `season_<name>_<variable>` setting.
staff_configurations_settings = ["site_logo", "index_image", "corner_popup"]
# A campaign stays live this many days after it ends.
ends_within_days = 1

# [seasons.campaigns.christmas]
# start_date = "12-01"
# end_date = "12-31"
# staff_configurations_settings = ["corner_popup_text"]
# settings = { site_logo = "img/logo_christmas.png", css_classes = "christmas" }

[map]
static_url = "/"
static_version = "1"
default_icon = "static/img/default_map_icon.png"
center = [30.0, 0.0]
zoom = 2
# Markers link their location to this user search page.
location_search_path = "/users/"

[translations.en]
months = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
]
month_day_format = "{month} {day}"

# [translations.fr]
# months = [
#     "janvier", "février", "mars", "avril", "mai", "juin",
#     "juillet", "août", "septembre", "octobre", "novembre", "décembre",
# ]
# month_day_format = "{day} {month}"
# messages = { "Happy Birthday" = "Joyeux anniversaire" }
"##
}
