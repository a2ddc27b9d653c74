//! Read interfaces to the site's data store.
//!
//! The generator never talks to a database directly. Each kind of record it
//! needs comes through one small trait, so the pipeline can run against the
//! JSON [`datastore`](crate::datastore) in production or in-memory fixtures
//! in tests. Collections used for share images have their own trait in
//! [`share_images`](crate::share_images).
//!
//! Record lists come back as [`Collected`]: a record the store cannot decode
//! is reported as skipped instead of failing the whole source. An `Err` means
//! the source as a whole could not be read.

use crate::date_window::{BirthdayWindow, MonthDay};
use crate::outcome::Collected;
use crate::staff_config::ConfigEntry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Administrator key/value records. Order is not significant.
pub trait ConfigSource {
    fn config_entries(&self) -> Result<Collected<ConfigEntry>, SourceError>;
}

/// An entity with yearly dates (a character's birthday, a release anniversary).
pub trait CalendarEntity {
    fn display_name(&self) -> Option<&str>;
    fn image(&self) -> Option<&str>;
    fn url(&self) -> Option<&str>;
    /// The yearly date stored under `field`, if any.
    fn reference_date(&self, field: &str) -> Option<MonthDay>;
}

/// Plain record implementing [`CalendarEntity`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Field name → yearly date, e.g. `"birthday": "02-29"`.
    #[serde(default)]
    pub dates: BTreeMap<String, MonthDay>,
}

impl CalendarEntity for CalendarRecord {
    fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|s| !s.is_empty())
    }

    fn image(&self) -> Option<&str> {
        self.image.as_deref().filter(|s| !s.is_empty())
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn reference_date(&self, field: &str) -> Option<MonthDay> {
        self.dates.get(field).copied()
    }
}

/// Entities whose yearly date falls near today.
///
/// Implementations may pre-filter by `window`; callers re-check the window
/// and the presence of name and image anyway.
pub trait EntitySource {
    fn entities_within(
        &self,
        field: &str,
        today: MonthDay,
        window: BirthdayWindow,
    ) -> Result<Collected<CalendarRecord>, SourceError>;
}

/// A registered site user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    /// Profile page URL.
    pub item_url: String,
    #[serde(default)]
    pub reputation: i64,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub favorite_character_image: Option<String>,
}

/// User lookups.
pub trait UserDirectory {
    /// Users born on `day` (any year), highest reputation first.
    fn users_born_on(&self, day: MonthDay) -> Result<Collected<UserRecord>, SourceError>;

    /// Users who entered a map location.
    fn users_with_location(&self) -> Result<Collected<UserRecord>, SourceError>;
}

/// Donation totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationMonthRecord {
    /// First day of the month.
    pub date: NaiveDate,
    /// Share of the monthly goal reached, in percent.
    pub percent: f64,
    /// Amount donated.
    pub donations: u64,
    /// Users who donated this month.
    #[serde(default)]
    pub donators: Vec<u64>,
}

/// Donation bookkeeping.
pub trait DonationSource {
    /// The month starting on `first_day`, if recorded.
    fn month_starting(&self, first_day: NaiveDate)
    -> Result<Option<DonationMonthRecord>, SourceError>;

    /// The most recent recorded month.
    fn latest_month(&self) -> Result<Option<DonationMonthRecord>, SourceError>;

    /// Users with an active donator status.
    fn total_donators(&self) -> Result<usize, SourceError>;
}
