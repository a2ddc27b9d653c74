//! Weekly share-image cache.
//!
//! Every auto-shareable collection gets a composite preview made of the first
//! images found in its items. Compositing is expensive, so results are cached
//! under one global timestamp:
//!
//! - cache absent or older than `max_age` → recompute **every** auto-shareable
//!   collection in one batch and stamp it with `now`
//! - otherwise → reuse the previous references unchanged
//! - debug mode → recompute on every run
//!
//! Collections are processed in parallel with rayon. Results are gathered into
//! a fresh [`ShareImageCache`] and returned as a whole; the previous cache is
//! never modified piecemeal. A collection that cannot be composited (too few
//! images, compositor failure, unreadable source) stores `None` and the batch
//! carries on.
//!
//! ## Image selection
//!
//! Each item contributes its best image, taken from the first non-empty field in
//! [`IMAGE_FALLBACK_FIELDS`] (a collection may override the list).

use crate::config::ShareImagesConfig;
use crate::imaging::{Compositor, GridParams};
use crate::outcome::{Collected, SkipReason, Skipped};
use crate::sources::SourceError;
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields searched for an item's image, best first.
pub const IMAGE_FALLBACK_FIELDS: [&str; 5] = [
    "share_image_in_list",
    "share_image",
    "top_image_list",
    "top_image",
    "image",
];

/// One item of a content collection, as a bag of named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentItem {
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ContentItem {
    /// Non-empty string value of `field`.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)?
            .as_str()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn best_image<S: AsRef<str>>(&self, fields: &[S]) -> Option<&str> {
        fields.iter().find_map(|f| self.text(f.as_ref()))
    }
}

/// A named content collection that may receive a share image.
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    fn auto_share_image(&self) -> bool;

    /// Ordering fields used to pick the items shown; `-field` sorts descending.
    fn default_ordering(&self) -> Vec<String>;

    fn image_fields(&self) -> Vec<String> {
        IMAGE_FALLBACK_FIELDS.iter().map(|f| f.to_string()).collect()
    }

    /// Up to `limit` items in `ordering`.
    fn fetch_items(&self, ordering: &[String], limit: usize)
    -> Result<Vec<ContentItem>, SourceError>;
}

/// Collections by name.
#[derive(Default)]
pub struct CollectionRegistry {
    collections: BTreeMap<String, Box<dyn Collection>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collection, replacing any previous one with the same name.
    pub fn register(&mut self, collection: Box<dyn Collection>) {
        let name = collection.name().to_string();
        if self.collections.insert(name.clone(), collection).is_some() {
            tracing::warn!("collection {} registered twice, keeping the last", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Collection> {
        self.collections.get(name).map(|c| c.as_ref())
    }

    /// Auto-shareable collections, in name order.
    pub fn auto_shareable(&self) -> Vec<&dyn Collection> {
        self.collections
            .values()
            .map(|c| c.as_ref())
            .filter(|c| c.auto_share_image())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Composite references from the last refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareImageCache {
    pub last_refresh: Option<DateTime<Utc>>,
    /// Collection name → composite reference, `None` when the last attempt failed.
    pub images: BTreeMap<String, Option<String>>,
}

impl ShareImageCache {
    /// True when the cache has never been filled or is older than `max_age`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now - last > max_age,
        }
    }
}

/// When to recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub max_age: Duration,
    /// Recompute every run regardless of age.
    pub always_refresh: bool,
}

impl RefreshPolicy {
    pub fn from_config(config: &ShareImagesConfig, debug: bool) -> Self {
        Self {
            max_age: Duration::days(config.max_age_days),
            always_refresh: debug,
        }
    }

    pub fn needs_refresh(&self, cache: &ShareImageCache, now: DateTime<Utc>) -> bool {
        self.always_refresh || cache.is_stale(now, self.max_age)
    }
}

/// Shape of every composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub images_per_share_image: usize,
    pub per_line: u32,
    pub tile_size: u32,
    pub max_items: usize,
}

impl GridLayout {
    pub fn from_config(config: &ShareImagesConfig) -> Self {
        Self {
            images_per_share_image: config.images_per_share_image,
            per_line: config.per_line,
            tile_size: config.tile_size,
            max_items: config.max_items,
        }
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::from_config(&ShareImagesConfig::default())
    }
}

/// Result of [`refresh_share_images`].
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub cache: ShareImageCache,
    /// Whether a recompute batch ran.
    pub refreshed: bool,
    pub skipped: Vec<Skipped>,
}

/// Reuse `previous` or recompute every auto-shareable collection.
pub fn refresh_share_images(
    previous: &ShareImageCache,
    now: DateTime<Utc>,
    policy: RefreshPolicy,
    layout: GridLayout,
    registry: &CollectionRegistry,
    compositor: &dyn Compositor,
) -> RefreshOutcome {
    if !policy.needs_refresh(previous, now) {
        tracing::info!(
            "share images are fresh (last refresh {}), reusing {} references",
            previous
                .last_refresh
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            previous.images.len()
        );
        return RefreshOutcome {
            cache: previous.clone(),
            refreshed: false,
            skipped: Vec::new(),
        };
    }

    let collections = registry.auto_shareable();
    tracing::info!(
        "regenerating share images for {} collections",
        collections.len()
    );

    let results: Vec<(String, Result<String, SkipReason>)> = collections
        .par_iter()
        .map(|collection| {
            let name = collection.name().to_string();
            let prior = previous.images.get(&name).cloned().flatten();
            let result = generate_for_collection(*collection, prior, layout, compositor);
            (name, result)
        })
        .collect();

    let mut report: Collected<()> = Collected::default();
    let mut images = BTreeMap::new();
    for (name, result) in results {
        match result {
            Ok(reference) => {
                tracing::debug!("share image for {}: {}", name, reference);
                images.insert(name, Some(reference));
            }
            Err(reason) => {
                report.skip(name.clone(), reason);
                images.insert(name, None);
            }
        }
    }

    RefreshOutcome {
        cache: ShareImageCache {
            last_refresh: Some(now),
            images,
        },
        refreshed: true,
        skipped: report.skipped,
    }
}

/// Pick the images for one collection and composite them.
pub fn generate_for_collection(
    collection: &dyn Collection,
    previous: Option<String>,
    layout: GridLayout,
    compositor: &dyn Compositor,
) -> Result<String, SkipReason> {
    let items = collection
        .fetch_items(&collection.default_ordering(), layout.max_items)
        .map_err(|e| SkipReason::SourceUnavailable(e.to_string()))?;

    let fields = collection.image_fields();
    let images: Vec<String> = items
        .iter()
        .filter_map(|item| item.best_image(&fields))
        .take(layout.images_per_share_image)
        .map(String::from)
        .collect();

    if images.len() < layout.images_per_share_image {
        return Err(SkipReason::InsufficientImages {
            found: images.len(),
            required: layout.images_per_share_image,
        });
    }

    compositor
        .compose(&GridParams {
            name: collection.name().to_string(),
            images,
            per_line: layout.per_line,
            tile_size: layout.tile_size,
            previous,
        })
        .map_err(|e| SkipReason::CompositeFailed(e.to_string()))
}
