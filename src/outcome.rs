//! Per-item results for batch steps.
//!
//! Every batch in the pipeline (birthdays, share images, map markers) follows
//! the same policy: an item that cannot be built is skipped and the batch
//! continues. Instead of swallowing those failures, each step returns a
//! [`Collected`] holding both the built items and a [`Skipped`] record per
//! dropped item, so callers and tests can see exactly what was left out and
//! why.

use std::fmt;
use thiserror::Error;

/// Why a single item was left out of a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("missing display name")]
    MissingName,
    #[error("missing image")]
    MissingImage,
    #[error("missing reference date")]
    MissingDate,
    #[error("no locale data for '{0}'")]
    MissingLocaleData(String),
    #[error("not enough images: found {found}, need {required}")]
    InsufficientImages { found: usize, required: usize },
    #[error("composite failed: {0}")]
    CompositeFailed(String),
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("invalid location: {0}")]
    InvalidLocation(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// A dropped item and the reason it was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Human label of the item (entity name, collection name, username).
    pub item: String,
    pub reason: SkipReason,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.reason)
    }
}

/// Output of a batch step: the built items plus everything that was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected<T> {
    pub items: Vec<T>,
    pub skipped: Vec<Skipped>,
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> From<Vec<T>> for Collected<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items,
            skipped: Vec::new(),
        }
    }
}

impl<T> Collected<T> {
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Record a skipped item and log it.
    pub fn skip(&mut self, item: impl Into<String>, reason: SkipReason) {
        let skipped = Skipped {
            item: item.into(),
            reason,
        };
        tracing::warn!("skipped {}", skipped);
        self.skipped.push(skipped);
    }

    /// Append another batch's items and skips onto this one.
    pub fn extend(&mut self, other: Collected<T>) {
        self.items.extend(other.items);
        self.skipped.extend(other.skipped);
    }
}
