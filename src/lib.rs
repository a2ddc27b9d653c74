//! # settings-gen
//!
//! A periodic generator for a community site's precomputed settings. Every
//! run gathers configuration and announcements from the data store,
//! recomputes a few derived values and publishes them as one text artifact
//! that the web tier reads at startup.
//!
//! # Architecture: One Pass, One Artifact
//!
//! ```text
//! data/                 →  assemble()  →  ConfigSnapshot  →  generated_settings.txt
//!   staff_configurations.json   (merge staff records, banners)
//!   characters.json             (birthdays near today)
//!   users.json                  (users born today, map markers)
//!   donations.json              (donation month summary)
//!   collections/*.json          (weekly share-image composites)
//! ```
//!
//! Each component is a function from its inputs to a plain value, so the
//! pipeline can be exercised without a database or real images. Failures of
//! a single item (a character without an image, a collection with too few
//! pictures) are collected as [`outcome::Skipped`] entries and logged; only a
//! failed write of the artifact itself is an error, and then the previous
//! artifact stays in place.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`staff_config`] | Merges administrator key/value records into one settings map and extracts banners |
//! | [`date_window`] | Year-less month-day arithmetic: windows around a date, campaign status |
//! | [`birthdays`] | Character and user birthday announcements, titled in every configured language |
//! | [`i18n`] | Explicit-locale month names and message translation |
//! | [`share_images`] | Weekly cache of per-collection share-image composites |
//! | [`imaging`] | The grid compositor behind share images, pure Rust on the `image` crate |
//! | [`seasons`] | Settings for currently running seasonal campaigns |
//! | [`donations`] | Donation progress for the current month |
//! | [`snapshot`] | Assembles, renders, parses and publishes the settings artifact |
//! | [`map`] | HTML fragment placing users on a world map |
//! | [`sources`] | Read traits for the data store |
//! | [`datastore`] | JSON directory implementation of every source trait |
//! | [`outcome`] | Per-item results: collected values plus skipped items with a reason |
//! | [`config`] | `settings-gen.toml` loading, merging and validation |
//! | [`types`] | Announcement types shared by banners and birthdays |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Locales
//!
//! Titles are rendered for each configured language by passing the locale to
//! a [`i18n::Translator`]. Nothing switches a process-wide "current language",
//! so collecting announcements in parallel or in tests never leaks state.
//!
//! ## Previous Artifact as Cache
//!
//! Share images are expensive, so they are rebuilt at most weekly. The last
//! refresh time and the generated references live in the published artifact
//! itself; [`snapshot::load_previous_cache`] reads them back on the next run.
//! No second state file can drift out of sync with what the site serves.
//!
//! ## Atomic Publish
//!
//! Artifacts are written to a temporary file next to the target and renamed
//! over it. Readers see either the old or the new file, never a partial one.

pub mod birthdays;
pub mod config;
pub mod datastore;
pub mod date_window;
pub mod donations;
pub mod i18n;
pub mod imaging;
pub mod map;
pub mod outcome;
pub mod output;
pub mod seasons;
pub mod share_images;
pub mod snapshot;
pub mod sources;
pub mod staff_config;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
