//! JSON data directory.
//!
//! The CLI reads the site's records from plain JSON files exported next to
//! the configuration. Every source trait in [`sources`](crate::sources) is
//! implemented on [`JsonStore`]:
//!
//! ```text
//! data/
//! ├── staff_configurations.json   # [ConfigEntry]
//! ├── characters.json             # [CalendarRecord]
//! ├── users.json                  # [UserRecord]
//! ├── donations.json              # {"months": [...], "donators": 42}
//! └── collections/
//!     ├── cards.json              # {"auto_share_image": true, "ordering": ["-id"], "items": [...]}
//!     └── events.json
//! ```
//!
//! A missing file reads as empty. A file that exists but does not parse is an
//! error for that source only. Inside a record file, each record is decoded
//! on its own: a bad one is skipped and reported, the others still load.

use crate::date_window::{BirthdayWindow, MonthDay};
use crate::outcome::{Collected, SkipReason};
use crate::share_images::{Collection, CollectionRegistry, ContentItem};
use crate::sources::{
    CalendarEntity, CalendarRecord, ConfigSource, DonationMonthRecord, DonationSource,
    EntitySource, SourceError, UserDirectory, UserRecord,
};
use crate::staff_config::ConfigEntry;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const STAFF_CONFIGURATIONS_FILE: &str = "staff_configurations.json";
pub const CHARACTERS_FILE: &str = "characters.json";
pub const USERS_FILE: &str = "users.json";
pub const DONATIONS_FILE: &str = "donations.json";
pub const COLLECTIONS_DIR: &str = "collections";

/// Read-only view of a data directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T, SourceError> {
        read_json_or_default(&self.root.join(file))
    }

    /// Records of a JSON array file, decoded one at a time.
    fn read_records<T: DeserializeOwned>(&self, file: &str) -> Result<Collected<T>, SourceError> {
        let raw: Vec<serde_json::Value> = self.read_or_default(file)?;
        let mut out = Collected::default();
        for (index, value) in raw.into_iter().enumerate() {
            let label = record_label(file, index, &value);
            match serde_json::from_value(value) {
                Ok(record) => out.push(record),
                Err(e) => out.skip(label, SkipReason::InvalidRecord(e.to_string())),
            }
        }
        Ok(out)
    }

    /// Every collection under `collections/`, named after its file stem.
    pub fn collections(&self) -> Result<CollectionRegistry, SourceError> {
        let mut registry = CollectionRegistry::new();
        let dir = self.root.join(COLLECTIONS_DIR);
        if !dir.is_dir() {
            return Ok(registry);
        }
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            registry.register(Box::new(JsonCollection::load(name, path)?));
        }
        Ok(registry)
    }
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, SourceError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("{} not found, reading as empty", path.display());
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// `users.json[3] (umi)`: position in the file plus a name when one is readable.
fn record_label(file: &str, index: usize, value: &serde_json::Value) -> String {
    let name = ["username", "name", "key"]
        .into_iter()
        .find_map(|field| value.get(field)?.as_str());
    match name {
        Some(name) => format!("{file}[{index}] ({name})"),
        None => format!("{file}[{index}]"),
    }
}

impl ConfigSource for JsonStore {
    fn config_entries(&self) -> Result<Collected<ConfigEntry>, SourceError> {
        self.read_records(STAFF_CONFIGURATIONS_FILE)
    }
}

impl EntitySource for JsonStore {
    fn entities_within(
        &self,
        field: &str,
        today: MonthDay,
        window: BirthdayWindow,
    ) -> Result<Collected<CalendarRecord>, SourceError> {
        let mut records: Collected<CalendarRecord> = self.read_records(CHARACTERS_FILE)?;
        records.items.retain(|r| {
            r.reference_date(field)
                .is_some_and(|date| window.contains(today, date))
        });
        Ok(records)
    }
}

impl UserDirectory for JsonStore {
    fn users_born_on(&self, day: MonthDay) -> Result<Collected<UserRecord>, SourceError> {
        let mut users: Collected<UserRecord> = self.read_records(USERS_FILE)?;
        users.items.retain(|u| {
            u.birthdate
                .is_some_and(|b| MonthDay::from_date(&b) == day)
        });
        users.items.sort_by(|a, b| b.reputation.cmp(&a.reputation));
        Ok(users)
    }

    fn users_with_location(&self) -> Result<Collected<UserRecord>, SourceError> {
        let mut users: Collected<UserRecord> = self.read_records(USERS_FILE)?;
        users.items.retain(|u| u.latitude.is_some());
        Ok(users)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DonationsFile {
    months: Vec<DonationMonthRecord>,
    donators: usize,
}

impl DonationSource for JsonStore {
    fn month_starting(
        &self,
        first_day: NaiveDate,
    ) -> Result<Option<DonationMonthRecord>, SourceError> {
        let file: DonationsFile = self.read_or_default(DONATIONS_FILE)?;
        Ok(file.months.into_iter().find(|m| m.date == first_day))
    }

    fn latest_month(&self) -> Result<Option<DonationMonthRecord>, SourceError> {
        let file: DonationsFile = self.read_or_default(DONATIONS_FILE)?;
        Ok(file.months.into_iter().max_by_key(|m| m.date))
    }

    fn total_donators(&self) -> Result<usize, SourceError> {
        let file: DonationsFile = self.read_or_default(DONATIONS_FILE)?;
        Ok(file.donators)
    }
}

// ============================================================================
// Collections
// ============================================================================

#[derive(Debug, Deserialize)]
struct CollectionFile {
    #[serde(default)]
    auto_share_image: bool,
    #[serde(default)]
    ordering: Vec<String>,
    #[serde(default)]
    image_fields: Option<Vec<String>>,
    #[serde(default)]
    items: Vec<ContentItem>,
}

/// A collection loaded from one JSON file.
#[derive(Debug, Clone)]
pub struct JsonCollection {
    name: String,
    auto_share_image: bool,
    ordering: Vec<String>,
    image_fields: Option<Vec<String>>,
    items: Vec<ContentItem>,
}

impl JsonCollection {
    pub fn load(name: &str, path: &Path) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path)?;
        let file: CollectionFile = serde_json::from_str(&content)?;
        Ok(Self {
            name: name.to_string(),
            auto_share_image: file.auto_share_image,
            ordering: file.ordering,
            image_fields: file.image_fields,
            items: file.items,
        })
    }
}

impl Collection for JsonCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn auto_share_image(&self) -> bool {
        self.auto_share_image
    }

    fn default_ordering(&self) -> Vec<String> {
        self.ordering.clone()
    }

    fn image_fields(&self) -> Vec<String> {
        match &self.image_fields {
            Some(fields) => fields.clone(),
            None => crate::share_images::IMAGE_FALLBACK_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }

    fn fetch_items(
        &self,
        ordering: &[String],
        limit: usize,
    ) -> Result<Vec<ContentItem>, SourceError> {
        let mut items = self.items.clone();
        items.sort_by(|a, b| compare_items(a, b, ordering));
        items.truncate(limit);
        Ok(items)
    }
}

/// Compare by each ordering field in turn; `-field` reverses that field.
pub fn compare_items(a: &ContentItem, b: &ContentItem, ordering: &[String]) -> Ordering {
    for key in ordering {
        let (field, descending) = match key.strip_prefix('-') {
            Some(field) => (field, true),
            None => (key.as_str(), false),
        };
        let order = compare_values(a.fields.get(field), b.fields.get(field));
        let order = if descending { order.reverse() } else { order };
        if order != Ordering::Equal {
            return order;
        }
    }
    Ordering::Equal
}

/// Numbers before strings; missing and other values last.
fn compare_values(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
    use serde_json::Value;
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            Some(Value::Number(_)) => 0,
            Some(Value::String(_)) => 1,
            Some(Value::Bool(_)) => 2,
            _ => 3,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
