//! Shared types used across pipeline stages.
//!
//! Announcements come from three places (staff banners, character birthdays,
//! user birthdays) and end up in one `LATEST_NEWS` list, so they share one
//! serialized shape.

use crate::staff_config::{BannerEntry, BannerValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Banner fields mapped onto named [`Announcement`] fields.
const KNOWN_BANNER_FIELDS: &[&str] = &["image", "title", "url", "hide_title", "ajax", "css_classes"];

/// What an announcement shows behind its title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visual {
    /// A banner image, shown as is.
    Image(String),
    /// An image used as a cropped background (character art).
    Background(String),
}

/// One front-page news entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Title per locale. Empty for staff banners, which carry a plain `title`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub t_titles: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub visual: Visual,
    pub url: String,
    #[serde(default)]
    pub hide_title: bool,
    #[serde(default)]
    pub ajax: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub css_classes: String,
    /// Any other banner fields staff filled in.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, BannerValue>,
}

impl From<BannerEntry> for Announcement {
    fn from(banner: BannerEntry) -> Self {
        let text = |field: &str| banner.text(field).unwrap_or_default().to_string();
        let extra = banner
            .fields
            .iter()
            .filter(|(k, _)| !KNOWN_BANNER_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            t_titles: BTreeMap::new(),
            title: banner.text("title").map(String::from),
            visual: Visual::Image(text("image")),
            url: text("url"),
            hide_title: banner.flag("hide_title"),
            ajax: banner.flag("ajax"),
            css_classes: text("css_classes"),
            extra,
        }
    }
}
