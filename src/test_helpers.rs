//! Shared test utilities for the settings-gen test suite.
//!
//! Provides record builders, an English/French [`MessageCatalog`], an
//! in-memory [`MemoryStore`] implementing every source trait, and
//! [`StaticCollection`] for share-image tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let store = MemoryStore {
//!     characters: vec![character("Rin", "/rin.png", "03-10")],
//!     users: vec![user_born(9, "kotori", 3, 10)],
//!     ..Default::default()
//! };
//! let out = collect_birthdays(Some(&store), Some(&store), today, &config, &langs(&["en"]), &catalog());
//! ```

use crate::config::TranslationTable;
use crate::date_window::{BirthdayWindow, MonthDay};
use crate::i18n::MessageCatalog;
use crate::outcome::Collected;
use crate::share_images::{Collection, ContentItem};
use crate::sources::{
    CalendarEntity, CalendarRecord, ConfigSource, DonationMonthRecord, DonationSource,
    EntitySource, SourceError, UserDirectory, UserRecord,
};
use crate::staff_config::ConfigEntry;
use chrono::NaiveDate;
use std::collections::BTreeMap;

// =========================================================================
// Record builders
// =========================================================================

/// Character with a `birthday` date in `MM-DD` form.
pub fn character(name: &str, image: &str, birthday: &str) -> CalendarRecord {
    CalendarRecord {
        name: Some(name.to_string()),
        image: Some(image.to_string()),
        url: Some(format!("/character/{}/", name.to_lowercase())),
        dates: [("birthday".to_string(), birthday.parse().unwrap())]
            .into_iter()
            .collect(),
    }
}

pub fn user(id: u64, username: &str, reputation: i64) -> UserRecord {
    UserRecord {
        id,
        username: username.to_string(),
        item_url: format!("/user/{}/{}/", id, username),
        reputation,
        ..Default::default()
    }
}

/// User born on `month`/`day` of 1995.
pub fn user_born(id: u64, username: &str, month: u32, day: u32) -> UserRecord {
    UserRecord {
        birthdate: NaiveDate::from_ymd_opt(1995, month, day),
        ..user(id, username, 0)
    }
}

pub fn langs(locales: &[&str]) -> Vec<String> {
    locales.iter().map(|l| l.to_string()).collect()
}

/// Item with string fields.
pub fn content_item(fields: &[(&str, &str)]) -> ContentItem {
    ContentItem {
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect(),
    }
}

// =========================================================================
// Translations
// =========================================================================

/// Catalog with `en` and `fr`.
pub fn catalog() -> MessageCatalog {
    let french = TranslationTable {
        months: [
            "janvier",
            "février",
            "mars",
            "avril",
            "mai",
            "juin",
            "juillet",
            "août",
            "septembre",
            "octobre",
            "novembre",
            "décembre",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        month_day_format: "{day} {month}".to_string(),
        messages: [("Happy Birthday".to_string(), "Joyeux anniversaire".to_string())]
            .into_iter()
            .collect(),
    };
    let mut tables = BTreeMap::new();
    tables.insert("en".to_string(), TranslationTable::english());
    tables.insert("fr".to_string(), french);
    MessageCatalog::new(tables)
}

// =========================================================================
// In-memory sources
// =========================================================================

/// Every source trait over plain vectors. `fail_*` flags make a source
/// return [`SourceError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub entries: Vec<ConfigEntry>,
    pub characters: Vec<CalendarRecord>,
    pub users: Vec<UserRecord>,
    pub donation_months: Vec<DonationMonthRecord>,
    pub donators: usize,
    pub fail_entries: bool,
    pub fail_characters: bool,
    pub fail_users: bool,
}

fn unavailable(what: &str) -> SourceError {
    SourceError::Unavailable(format!("{what} offline"))
}

impl ConfigSource for MemoryStore {
    fn config_entries(&self) -> Result<Collected<ConfigEntry>, SourceError> {
        if self.fail_entries {
            return Err(unavailable("config"));
        }
        Ok(self.entries.clone().into())
    }
}

impl EntitySource for MemoryStore {
    fn entities_within(
        &self,
        field: &str,
        today: MonthDay,
        window: BirthdayWindow,
    ) -> Result<Collected<CalendarRecord>, SourceError> {
        if self.fail_characters {
            return Err(unavailable("characters"));
        }
        let within: Vec<CalendarRecord> = self
            .characters
            .iter()
            .filter(|c| {
                c.reference_date(field)
                    .is_some_and(|d| window.contains(today, d))
            })
            .cloned()
            .collect();
        Ok(within.into())
    }
}

impl UserDirectory for MemoryStore {
    fn users_born_on(&self, day: MonthDay) -> Result<Collected<UserRecord>, SourceError> {
        if self.fail_users {
            return Err(unavailable("users"));
        }
        let mut born: Vec<UserRecord> = self
            .users
            .iter()
            .filter(|u| u.birthdate.is_some_and(|b| MonthDay::from_date(&b) == day))
            .cloned()
            .collect();
        born.sort_by(|a, b| b.reputation.cmp(&a.reputation));
        Ok(born.into())
    }

    fn users_with_location(&self) -> Result<Collected<UserRecord>, SourceError> {
        if self.fail_users {
            return Err(unavailable("users"));
        }
        let located: Vec<UserRecord> = self
            .users
            .iter()
            .filter(|u| u.latitude.is_some())
            .cloned()
            .collect();
        Ok(located.into())
    }
}

impl DonationSource for MemoryStore {
    fn month_starting(
        &self,
        first_day: NaiveDate,
    ) -> Result<Option<DonationMonthRecord>, SourceError> {
        Ok(self
            .donation_months
            .iter()
            .find(|m| m.date == first_day)
            .cloned())
    }

    fn latest_month(&self) -> Result<Option<DonationMonthRecord>, SourceError> {
        Ok(self.donation_months.iter().max_by_key(|m| m.date).cloned())
    }

    fn total_donators(&self) -> Result<usize, SourceError> {
        Ok(self.donators)
    }
}

// =========================================================================
// Collections
// =========================================================================

/// Collection serving a fixed item list in its stored order.
#[derive(Debug, Clone)]
pub struct StaticCollection {
    pub name: String,
    pub shareable: bool,
    pub fail: bool,
    pub items: Vec<ContentItem>,
}

impl StaticCollection {
    pub fn new(name: &str, items: Vec<ContentItem>) -> Self {
        Self {
            name: name.to_string(),
            shareable: true,
            fail: false,
            items,
        }
    }

    /// `count` items, each with one `image` field.
    pub fn with_images(name: &str, count: usize) -> Self {
        let items = (0..count)
            .map(|i| content_item(&[("image", format!("/{name}/{i}.png").as_str())]))
            .collect();
        Self::new(name, items)
    }

    pub fn not_shareable(mut self) -> Self {
        self.shareable = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Collection for StaticCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn auto_share_image(&self) -> bool {
        self.shareable
    }

    fn default_ordering(&self) -> Vec<String> {
        Vec::new()
    }

    fn fetch_items(
        &self,
        _ordering: &[String],
        limit: usize,
    ) -> Result<Vec<ContentItem>, SourceError> {
        if self.fail {
            return Err(unavailable(&self.name));
        }
        Ok(self.items.iter().take(limit).cloned().collect())
    }
}
