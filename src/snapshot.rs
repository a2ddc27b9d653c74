//! Snapshot assembly and the generated settings artifact.
//!
//! One run of the pipeline produces one [`ConfigSnapshot`]:
//!
//! ```text
//! staff configurations ──► banners ─┐
//!          │                        ├─► LATEST_NEWS
//!          │          birthdays ────┘
//!          │          share images (weekly cache)
//!          └────────► seasonal settings
//!                     donation month
//! ```
//!
//! Caller-supplied values take precedence: a non-empty `STAFF_CONFIGURATIONS`
//! replaces the merged administrator records, `LATEST_NEWS` entries go first
//! in the news list, and any other supplied name overrides the computed field
//! of the same name or is published as an extra assignment.
//!
//! ## Artifact format
//!
//! ```text
//! # Generated by settings-gen. Do not edit.
//! DONATION_MONTH = {"date":"2024-06-01",...}
//! GENERATED_SHARE_IMAGES = {"cards":"/media/share/cards.png"}
//! GENERATED_SHARE_IMAGES_LAST_DATE = "2024-06-15T12:00:00+00:00"
//! LATEST_NEWS = [...]
//! SEASONAL_SETTINGS = {}
//! STAFF_CONFIGURATIONS = {...}
//! TOTAL_DONATORS = 42
//! TOTAL_DONATORS_THIS_MONTH = 7
//! GENERATED_DATE = "2024-06-15T12:00:00.123+00:00"
//! ```
//!
//! One assignment per line, compact JSON values, names sorted, the generation
//! timestamp always last. The file is replaced atomically: readers see either
//! the previous artifact or the new one.

use crate::birthdays::collect_birthdays;
use crate::config::GeneratorConfig;
use crate::date_window::MonthDay;
use crate::donations::{DonationSummary, donation_figures, first_of_month};
use crate::i18n::Translator;
use crate::imaging::Compositor;
use crate::outcome::{Collected, SkipReason, Skipped};
use crate::seasons::{SeasonalSettings, resolve_seasonal_settings};
use crate::share_images::{
    CollectionRegistry, GridLayout, RefreshPolicy, ShareImageCache, refresh_share_images,
};
use crate::sources::{ConfigSource, DonationSource, EntitySource, UserDirectory};
use crate::staff_config::{SettingValue, StaffConfigurations, merge_entries};
use crate::types::Announcement;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STAFF_CONFIGURATIONS: &str = "STAFF_CONFIGURATIONS";
pub const LATEST_NEWS: &str = "LATEST_NEWS";
pub const GENERATED_SHARE_IMAGES: &str = "GENERATED_SHARE_IMAGES";
pub const GENERATED_SHARE_IMAGES_LAST_DATE: &str = "GENERATED_SHARE_IMAGES_LAST_DATE";
pub const SEASONAL_SETTINGS: &str = "SEASONAL_SETTINGS";
pub const DONATION_MONTH: &str = "DONATION_MONTH";
pub const TOTAL_DONATORS: &str = "TOTAL_DONATORS";
pub const TOTAL_DONATORS_THIS_MONTH: &str = "TOTAL_DONATORS_THIS_MONTH";
pub const GENERATED_DATE: &str = "GENERATED_DATE";

const HEADER: &str = "# Generated by settings-gen. Do not edit.\n";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Values supplied by the caller, keyed by artifact name.
pub type ExistingValues = BTreeMap<String, serde_json::Value>;

/// Fully resolved settings from one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub staff_configurations: StaffConfigurations,
    pub latest_news: Vec<Announcement>,
    pub share_images: ShareImageCache,
    pub seasonal_settings: SeasonalSettings,
    pub donation_month: Option<DonationSummary>,
    /// Distinct donators of the donation month.
    pub donators_this_month: Option<usize>,
    pub total_donators: Option<usize>,
    /// Caller-supplied assignments with no computed counterpart.
    pub extra: BTreeMap<String, serde_json::Value>,
    pub generated_at: DateTime<Utc>,
}

impl ConfigSnapshot {
    /// Every assignment except `GENERATED_DATE`, by name.
    pub fn to_assignments(&self) -> Result<BTreeMap<String, serde_json::Value>, SnapshotError> {
        let mut out = self.extra.clone();
        out.insert(
            STAFF_CONFIGURATIONS.into(),
            serde_json::to_value(&self.staff_configurations)?,
        );
        out.insert(LATEST_NEWS.into(), serde_json::to_value(&self.latest_news)?);
        out.insert(
            GENERATED_SHARE_IMAGES.into(),
            serde_json::to_value(&self.share_images.images)?,
        );
        out.insert(
            GENERATED_SHARE_IMAGES_LAST_DATE.into(),
            serde_json::to_value(self.share_images.last_refresh.map(format_timestamp))?,
        );
        out.insert(
            SEASONAL_SETTINGS.into(),
            serde_json::to_value(&self.seasonal_settings)?,
        );
        if let Some(donation_month) = &self.donation_month {
            out.insert(DONATION_MONTH.into(), serde_json::to_value(donation_month)?);
        }
        if let Some(count) = self.donators_this_month {
            out.insert(TOTAL_DONATORS_THIS_MONTH.into(), count.into());
        }
        if let Some(count) = self.total_donators {
            out.insert(TOTAL_DONATORS.into(), count.into());
        }
        Ok(out)
    }

    /// Rebuild a snapshot from parsed assignments.
    pub fn from_assignments(
        mut assignments: BTreeMap<String, serde_json::Value>,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, SnapshotError> {
        let mut take = |name: &str| assignments.remove(name);
        let staff_configurations = match take(STAFF_CONFIGURATIONS) {
            Some(value) => decode_staff(value)?,
            None => StaffConfigurations::default(),
        };
        let latest_news = decode_or_default(LATEST_NEWS, take(LATEST_NEWS))?;
        let images =
            decode_or_default(GENERATED_SHARE_IMAGES, take(GENERATED_SHARE_IMAGES))?;
        let last_refresh = decode_or_default(
            GENERATED_SHARE_IMAGES_LAST_DATE,
            take(GENERATED_SHARE_IMAGES_LAST_DATE),
        )?;
        let seasonal_settings =
            decode_or_default(SEASONAL_SETTINGS, take(SEASONAL_SETTINGS))?;
        let donation_month = decode_or_default(DONATION_MONTH, take(DONATION_MONTH))?;
        let donators_this_month =
            decode_or_default(TOTAL_DONATORS_THIS_MONTH, take(TOTAL_DONATORS_THIS_MONTH))?;
        let total_donators = decode_or_default(TOTAL_DONATORS, take(TOTAL_DONATORS))?;
        assignments.remove(GENERATED_DATE);

        Ok(Self {
            staff_configurations,
            latest_news,
            share_images: ShareImageCache {
                last_refresh,
                images,
            },
            seasonal_settings,
            donation_month,
            donators_this_month,
            total_donators,
            extra: assignments,
            generated_at,
        })
    }
}

/// RFC 3339 in UTC with a fixed shape, so equal instants render equally.
fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn decode<T: DeserializeOwned>(name: &str, value: serde_json::Value) -> Result<T, SnapshotError> {
    serde_json::from_value(value).map_err(|e| SnapshotError::InvalidValue {
        name: name.to_string(),
        message: e.to_string(),
    })
}

fn decode_or_default<T: DeserializeOwned + Default>(
    name: &str,
    value: Option<serde_json::Value>,
) -> Result<T, SnapshotError> {
    match value {
        Some(value) => decode(name, value),
        None => Ok(T::default()),
    }
}

/// Staff configurations as supplied by a caller. `null` values count as
/// absent keys.
fn decode_staff(value: serde_json::Value) -> Result<StaffConfigurations, SnapshotError> {
    let raw: BTreeMap<String, Option<SettingValue>> = decode(STAFF_CONFIGURATIONS, value)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| Some((key, value?)))
        .collect())
}

/// Data sources consulted by [`assemble`]. Missing sources contribute nothing.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub config: Option<&'a dyn ConfigSource>,
    pub characters: Option<&'a dyn EntitySource>,
    pub users: Option<&'a dyn UserDirectory>,
    pub donations: Option<&'a dyn DonationSource>,
    pub collections: &'a CollectionRegistry,
    pub compositor: &'a dyn Compositor,
    pub translator: &'a dyn Translator,
}

/// A snapshot plus what happened while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub snapshot: ConfigSnapshot,
    pub skipped: Vec<Skipped>,
    pub staff_from_existing: bool,
    pub share_images_refreshed: bool,
}

/// Run the whole pipeline once.
///
/// `previous` is the share-image cache from the last published artifact.
/// Per-item failures are reported in [`Assembly::skipped`]; only malformed
/// caller-supplied values are errors.
pub fn assemble(
    config: &GeneratorConfig,
    sources: &Sources<'_>,
    existing: &ExistingValues,
    previous: &ShareImageCache,
    now: DateTime<Utc>,
) -> Result<Assembly, SnapshotError> {
    let today = MonthDay::from_date(&now.date_naive());
    let mut report: Collected<Announcement> = Collected::default();

    if let Some(news) = existing.get(LATEST_NEWS) {
        let news: Vec<Announcement> = decode(LATEST_NEWS, news.clone())?;
        report.items.extend(news);
    }

    // Staff configurations and banners
    let supplied_staff = existing
        .get(STAFF_CONFIGURATIONS)
        .filter(|v| !is_empty_value(v));
    let staff_from_existing = supplied_staff.is_some();
    let staff_configurations: StaffConfigurations = match supplied_staff {
        Some(value) => decode_staff(value.clone())?,
        None => {
            let merged = match sources.config.map(|s| s.config_entries()) {
                Some(Ok(entries)) => {
                    report.skipped.extend(entries.skipped);
                    merge_entries(&entries.items)
                }
                Some(Err(e)) => {
                    report.skip(
                        "staff configurations",
                        SkipReason::SourceUnavailable(e.to_string()),
                    );
                    Default::default()
                }
                None => Default::default(),
            };
            for (key, reason) in merged.rejected {
                report.skip(key, reason);
            }
            report
                .items
                .extend(merged.banners.into_iter().map(Announcement::from));
            merged.settings
        }
    };
    tracing::info!(
        "{} staff configurations ({})",
        staff_configurations.len(),
        if staff_from_existing { "supplied" } else { "merged" }
    );

    // Birthdays
    report.extend(collect_birthdays(
        sources.characters,
        sources.users,
        today,
        &config.birthdays,
        &config.languages,
        sources.translator,
    ));

    // Share images
    let refresh = refresh_share_images(
        previous,
        now,
        RefreshPolicy::from_config(&config.share_images, config.debug),
        GridLayout::from_config(&config.share_images),
        sources.collections,
        sources.compositor,
    );
    report.skipped.extend(refresh.skipped);

    // Seasons
    let seasonal_settings =
        resolve_seasonal_settings(&config.seasons, today, &staff_configurations);

    // Donations
    let (donation_month, donators_this_month, total_donators) = match sources.donations {
        Some(source) => match donation_figures(source, now.date_naive()) {
            Ok(figures) => (
                figures.month,
                Some(figures.donators_this_month),
                Some(figures.total_donators),
            ),
            Err(e) => {
                report.skip("donations", SkipReason::SourceUnavailable(e.to_string()));
                let zero = DonationSummary::zero(first_of_month(now.date_naive()));
                (Some(zero), None, None)
            }
        },
        None => (None, None, None),
    };

    let mut snapshot = ConfigSnapshot {
        staff_configurations,
        latest_news: report.items,
        share_images: refresh.cache,
        seasonal_settings,
        donation_month,
        donators_this_month,
        total_donators,
        extra: BTreeMap::new(),
        generated_at: now,
    };
    apply_overrides(&mut snapshot, existing)?;

    Ok(Assembly {
        snapshot,
        skipped: report.skipped,
        staff_from_existing,
        share_images_refreshed: refresh.refreshed,
    })
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Caller-supplied values win over computed ones.
///
/// `LATEST_NEWS` was already merged in front of the computed news, and
/// `GENERATED_DATE` always reflects this run.
fn apply_overrides(
    snapshot: &mut ConfigSnapshot,
    existing: &ExistingValues,
) -> Result<(), SnapshotError> {
    for (name, value) in existing {
        match name.as_str() {
            STAFF_CONFIGURATIONS => {
                snapshot.staff_configurations = decode_staff(value.clone())?;
            }
            GENERATED_SHARE_IMAGES => {
                snapshot.share_images.images = decode(name, value.clone())?;
            }
            GENERATED_SHARE_IMAGES_LAST_DATE => {
                snapshot.share_images.last_refresh = decode(name, value.clone())?;
            }
            SEASONAL_SETTINGS => {
                snapshot.seasonal_settings = decode(name, value.clone())?;
            }
            DONATION_MONTH => {
                snapshot.donation_month = decode(name, value.clone())?;
            }
            TOTAL_DONATORS_THIS_MONTH => {
                snapshot.donators_this_month = decode(name, value.clone())?;
            }
            TOTAL_DONATORS => {
                snapshot.total_donators = decode(name, value.clone())?;
            }
            LATEST_NEWS => {}
            GENERATED_DATE => {
                tracing::warn!("ignoring supplied {}", GENERATED_DATE);
            }
            _ if is_assignment_name(name) => {
                snapshot.extra.insert(name.clone(), value.clone());
            }
            _ => {
                return Err(SnapshotError::InvalidValue {
                    name: name.clone(),
                    message: "names must be upper-case identifiers".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// `UPPER_SNAKE_CASE`, starting with a letter.
fn is_assignment_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

// ============================================================================
// Artifact text
// ============================================================================

/// Render the artifact text.
pub fn render_artifact(snapshot: &ConfigSnapshot) -> Result<String, SnapshotError> {
    let mut out = String::from(HEADER);
    for (name, value) in snapshot.to_assignments()? {
        out.push_str(&assignment_line(&name, &value)?);
    }
    out.push_str(&assignment_line(
        GENERATED_DATE,
        &serde_json::Value::String(format_timestamp(snapshot.generated_at)),
    )?);
    Ok(out)
}

fn assignment_line(name: &str, value: &impl Serialize) -> Result<String, SnapshotError> {
    Ok(format!("{} = {}\n", name, serde_json::to_string(value)?))
}

/// Assignments read back from an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArtifact {
    pub assignments: BTreeMap<String, serde_json::Value>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl ParsedArtifact {
    pub fn into_snapshot(self) -> Result<ConfigSnapshot, SnapshotError> {
        let generated_at = self.generated_at.ok_or_else(|| SnapshotError::InvalidValue {
            name: GENERATED_DATE.to_string(),
            message: "missing".to_string(),
        })?;
        ConfigSnapshot::from_assignments(self.assignments, generated_at)
    }

    /// The share-image cache recorded in this artifact.
    pub fn share_image_cache(&self) -> Result<ShareImageCache, SnapshotError> {
        Ok(ShareImageCache {
            last_refresh: decode_or_default(
                GENERATED_SHARE_IMAGES_LAST_DATE,
                self.assignments.get(GENERATED_SHARE_IMAGES_LAST_DATE).cloned(),
            )?,
            images: decode_or_default(
                GENERATED_SHARE_IMAGES,
                self.assignments.get(GENERATED_SHARE_IMAGES).cloned(),
            )?,
        })
    }
}

/// Parse artifact text produced by [`render_artifact`].
pub fn parse_artifact(text: &str) -> Result<ParsedArtifact, SnapshotError> {
    let mut assignments = BTreeMap::new();
    let mut generated_at = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parse_error = |message: String| SnapshotError::Parse {
            line: index + 1,
            message,
        };
        let (name, value) = line
            .split_once(" = ")
            .ok_or_else(|| parse_error("expected NAME = value".to_string()))?;
        let name = name.trim();
        if !is_assignment_name(name) {
            return Err(parse_error(format!("invalid name '{}'", name)));
        }
        let value: serde_json::Value =
            serde_json::from_str(value).map_err(|e| parse_error(e.to_string()))?;

        if name == GENERATED_DATE {
            generated_at = Some(decode(GENERATED_DATE, value)?);
        } else {
            assignments.insert(name.to_string(), value);
        }
    }

    Ok(ParsedArtifact {
        assignments,
        generated_at,
    })
}

/// Share-image cache from the artifact previously published at `path`.
///
/// A missing, unreadable or malformed artifact yields an empty cache, which
/// forces a refresh.
pub fn load_previous_cache(path: &Path) -> ShareImageCache {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("no previous artifact at {}", path.display());
            return ShareImageCache::default();
        }
        Err(e) => {
            tracing::warn!("cannot read previous artifact {}: {}", path.display(), e);
            return ShareImageCache::default();
        }
    };
    match parse_artifact(&text).and_then(|parsed| parsed.share_image_cache()) {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!(
                "ignoring malformed previous artifact {}: {}",
                path.display(),
                e
            );
            ShareImageCache::default()
        }
    }
}

// ============================================================================
// Publishing
// ============================================================================

/// Mode of every published file: owner read-write, everyone else read.
pub const PUBLISHED_MODE: u32 = 0o644;

/// Temporary files start out owner-only; published ones must be readable by
/// the web server.
pub fn set_published_mode(file: &std::fs::File) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(PUBLISHED_MODE))?;
    }
    #[cfg(not(unix))]
    let _ = file;
    Ok(())
}

/// Replace `path` with `contents` in one step.
///
/// The new content is written to a temporary file next to `path` and renamed
/// over it. On any failure the previous file is left as it was.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    set_published_mode(tmp.as_file())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Render and publish `snapshot` at `path`.
pub fn publish(snapshot: &ConfigSnapshot, path: &Path) -> Result<String, SnapshotError> {
    let text = render_artifact(snapshot)?;
    write_atomic(path, &text).map_err(|source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("wrote {}", path.display());
    Ok(text)
}
