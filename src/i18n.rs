//! Locale-aware message rendering.
//!
//! Titles are rendered once per configured language. The locale is always an
//! explicit argument: nothing here reads or changes a process-wide "current
//! language", so rendering one locale can never leak into another and the
//! functions are safe to call from parallel workers.

use crate::config::TranslationTable;
use crate::date_window::MonthDay;
use std::collections::BTreeMap;

/// Renders messages and dates for a given locale.
pub trait Translator: Sync {
    /// Translate `message` into `locale`.
    ///
    /// Returns `None` when the locale itself is unknown. A known locale
    /// without a translation for `message` returns `message` unchanged.
    fn translate(&self, locale: &str, message: &str) -> Option<String>;

    /// Format a month and day the way `locale` writes them (e.g. "March 7",
    /// "7 mars"). `None` when the locale is unknown.
    fn month_day(&self, locale: &str, date: MonthDay) -> Option<String>;
}

/// [`Translator`] backed by the `[translations.*]` tables of the config.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    tables: BTreeMap<String, TranslationTable>,
}

impl MessageCatalog {
    pub fn new(tables: BTreeMap<String, TranslationTable>) -> Self {
        Self { tables }
    }
}

impl Translator for MessageCatalog {
    fn translate(&self, locale: &str, message: &str) -> Option<String> {
        let table = self.tables.get(locale)?;
        Some(
            table
                .messages
                .get(message)
                .cloned()
                .unwrap_or_else(|| message.to_string()),
        )
    }

    fn month_day(&self, locale: &str, date: MonthDay) -> Option<String> {
        let table = self.tables.get(locale)?;
        let month = table.months.get((date.month() - 1) as usize)?;
        Some(
            table
                .month_day_format
                .replace("{month}", month)
                .replace("{day}", &date.day().to_string()),
        )
    }
}
