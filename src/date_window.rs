//! Year-less date matching for recurring events.
//!
//! Birthdays and seasonal campaigns repeat every year, so they are compared
//! on a normalized calendar where only month and day matter. Every
//! [`MonthDay`] maps to an ordinal on a 365-day non-leap year; February 29
//! shares its ordinal with February 28 so leap-day anchors still match in
//! non-leap years. Windows are inclusive on both ends and wrap across
//! December 31.
//!
//! Two distinct policies sit on top of [`matches`]:
//!
//! - [`BirthdayWindow`]: two-sided around today. A birthday is announced
//!   when it fell up to `days_before` days ago or comes within `days_after`
//!   days (defaults 1 and 12).
//! - [`EndedRecentlyPolicy`]: single-sided, "ended within N days" after a
//!   campaign's end date (default 1), used by [`event_status`].

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Days in the normalized (non-leap) reference year.
pub const DAYS_IN_YEAR: u32 = 365;

const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonthDayError {
    #[error("expected MM-DD, got '{0}'")]
    Format(String),
    #[error("no such day: {month:02}-{day:02}")]
    OutOfRange { month: u32, day: u32 },
}

/// A calendar day without a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// Build a month-day, accepting February 29.
    pub fn new(month: u32, day: u32) -> Result<Self, MonthDayError> {
        let max_day = match month {
            2 => 29,
            1..=12 => DAYS_IN_MONTH[(month - 1) as usize],
            _ => 0,
        };
        if day == 0 || day > max_day {
            return Err(MonthDayError::OutOfRange { month, day });
        }
        Ok(Self { month, day })
    }

    pub fn from_date(date: &impl Datelike) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn day(self) -> u32 {
        self.day
    }

    /// Zero-based position on the non-leap reference year.
    pub fn ordinal(self) -> u32 {
        let before: u32 = DAYS_IN_MONTH[..(self.month - 1) as usize].iter().sum();
        let day = if self.month == 2 { self.day.min(28) } else { self.day };
        before + day - 1
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

impl FromStr for MonthDay {
    type Err = MonthDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (month, day) = s
            .split_once('-')
            .ok_or_else(|| MonthDayError::Format(s.to_string()))?;
        let month = month
            .trim()
            .parse()
            .map_err(|_| MonthDayError::Format(s.to_string()))?;
        let day = day
            .trim()
            .parse()
            .map_err(|_| MonthDayError::Format(s.to_string()))?;
        Self::new(month, day)
    }
}

impl TryFrom<String> for MonthDay {
    type Error = MonthDayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthDay> for String {
    fn from(value: MonthDay) -> Self {
        value.to_string()
    }
}

/// Forward distance in days from `from` to `to` on the wrapped calendar.
fn days_forward(from: MonthDay, to: MonthDay) -> u32 {
    (to.ordinal() + DAYS_IN_YEAR - from.ordinal()) % DAYS_IN_YEAR
}

/// Whether `today` lies in `[anchor - before, anchor + after]`, ignoring
/// years. Both bounds are inclusive and the window may cross December 31.
pub fn matches(today: MonthDay, anchor: MonthDay, before: u32, after: u32) -> bool {
    let since_anchor = days_forward(anchor, today);
    since_anchor <= after || DAYS_IN_YEAR - since_anchor <= before
}

/// Two-sided window used to announce birthdays, measured from today:
/// an anchor in `[today - days_before, today + days_after]` is announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdayWindow {
    pub days_before: u32,
    pub days_after: u32,
}

impl Default for BirthdayWindow {
    fn default() -> Self {
        Self {
            days_before: 1,
            days_after: 12,
        }
    }
}

impl BirthdayWindow {
    pub fn contains(&self, today: MonthDay, anchor: MonthDay) -> bool {
        matches(today, anchor, self.days_after, self.days_before)
    }
}

/// Single-sided window: a campaign counts as "ended recently" for
/// `ends_within` days after its end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndedRecentlyPolicy {
    pub ends_within: u32,
}

impl Default for EndedRecentlyPolicy {
    fn default() -> Self {
        Self { ends_within: 1 }
    }
}

/// Where a yearly campaign stands relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Upcoming,
    Current,
    EndedRecently,
    Ended,
}

impl EventStatus {
    /// Current and recently-ended campaigns still apply their settings.
    pub fn is_live(self) -> bool {
        matches!(self, EventStatus::Current | EventStatus::EndedRecently)
    }
}

/// Status of a yearly campaign running from `start` to `end` (inclusive).
///
/// The span may wrap across the new year (e.g. `12-20` to `01-05`). Outside
/// the span and the ended-recently window, the campaign is `Upcoming` when
/// its next start is strictly nearer than its last end, `Ended` otherwise.
pub fn event_status(
    today: MonthDay,
    start: MonthDay,
    end: MonthDay,
    policy: EndedRecentlyPolicy,
) -> EventStatus {
    let span = days_forward(start, end);
    let position = days_forward(start, today);
    if position <= span {
        return EventStatus::Current;
    }
    if matches(today, end, 0, policy.ends_within) {
        return EventStatus::EndedRecently;
    }
    let since_end = position - span;
    let until_start = DAYS_IN_YEAR - position;
    if until_start < since_end {
        EventStatus::Upcoming
    } else {
        EventStatus::Ended
    }
}
