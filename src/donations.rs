//! Donation month summary.
//!
//! The site shows progress toward the current month's donation goal. A month
//! that has not been opened yet falls back to the latest recorded month, and
//! with no months at all to a zero summary dated the first of the current
//! month. Alongside it the snapshot carries how many people donated that
//! month and how many hold a donator status overall.

use crate::sources::{DonationMonthRecord, DonationSource, SourceError};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Donation progress as published in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationSummary {
    pub percent: f64,
    pub percent_int: u32,
    pub date: NaiveDate,
    pub donations: u64,
    pub reached_100_percent: bool,
}

impl DonationSummary {
    pub fn zero(date: NaiveDate) -> Self {
        Self {
            percent: 0.0,
            percent_int: 0,
            date,
            donations: 0,
            reached_100_percent: false,
        }
    }
}

impl From<&DonationMonthRecord> for DonationSummary {
    fn from(month: &DonationMonthRecord) -> Self {
        let percent = month.percent.max(0.0);
        Self {
            percent,
            percent_int: percent.floor() as u32,
            date: month.date,
            donations: month.donations,
            reached_100_percent: percent >= 100.0,
        }
    }
}

/// First day of `today`'s month.
pub fn first_of_month(today: NaiveDate) -> NaiveDate {
    today.with_day(1).unwrap_or(today)
}

/// This month's record, or the latest one.
fn current_or_latest(
    source: &dyn DonationSource,
    today: NaiveDate,
) -> Result<Option<DonationMonthRecord>, SourceError> {
    match source.month_starting(first_of_month(today))? {
        Some(month) => Ok(Some(month)),
        None => source.latest_month(),
    }
}

/// Summary for the current month.
///
/// Without `failsafe`, a month that has not been recorded yields `None`. With
/// it, the latest month is used instead, then the zero summary.
pub fn latest_donation_month(
    source: &dyn DonationSource,
    today: NaiveDate,
    failsafe: bool,
) -> Result<Option<DonationSummary>, SourceError> {
    let this_month = first_of_month(today);
    if let Some(month) = source.month_starting(this_month)? {
        return Ok(Some(DonationSummary::from(&month)));
    }
    if !failsafe {
        return Ok(None);
    }
    let summary = match source.latest_month()? {
        Some(month) => DonationSummary::from(&month),
        None => {
            tracing::debug!("no donation months recorded, using zero summary");
            DonationSummary::zero(this_month)
        }
    };
    Ok(Some(summary))
}

/// Distinct donators of the current (or latest) month; zero with no months.
pub fn donators_this_month(
    source: &dyn DonationSource,
    today: NaiveDate,
) -> Result<usize, SourceError> {
    let Some(month) = current_or_latest(source, today)? else {
        return Ok(0);
    };
    let mut donators = month.donators;
    donators.sort_unstable();
    donators.dedup();
    Ok(donators.len())
}

/// Everything a run publishes about donations.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationFigures {
    pub month: Option<DonationSummary>,
    pub donators_this_month: usize,
    pub total_donators: usize,
}

/// Month summary (failsafe) plus donator counts, from one source.
pub fn donation_figures(
    source: &dyn DonationSource,
    today: NaiveDate,
) -> Result<DonationFigures, SourceError> {
    Ok(DonationFigures {
        month: latest_donation_month(source, today, true)?,
        donators_this_month: donators_this_month(source, today)?,
        total_donators: source.total_donators()?,
    })
}
