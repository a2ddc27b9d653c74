//! Seasonal campaign settings.
//!
//! A campaign contributes to the snapshot while it is running and for a short
//! grace period after it ends (see [`EndedRecentlyPolicy`]). Its effective
//! values are built in two layers:
//!
//! 1. every globally available variable the campaign declares statically
//! 2. staff overrides stored under `season_<campaign>_<variable>`, for the
//!    global overridable variables plus the campaign's own list
//!
//! An override is applied even when it is an empty string; only a missing key
//! leaves the static value in place.

use crate::config::{Campaign, SeasonsConfig};
use crate::date_window::{EndedRecentlyPolicy, EventStatus, MonthDay, event_status};
use crate::staff_config::StaffConfigurations;
use std::collections::BTreeMap;

/// Effective values of one live campaign.
pub type SeasonValues = BTreeMap<String, serde_json::Value>;

/// Campaign name → effective values, live campaigns only.
pub type SeasonalSettings = BTreeMap<String, SeasonValues>;

/// Staff configuration key overriding `variable` for `campaign`.
pub fn override_key(campaign: &str, variable: &str) -> String {
    format!("season_{}_{}", campaign, variable)
}

/// Effective values for every live campaign.
pub fn resolve_seasonal_settings(
    config: &SeasonsConfig,
    today: MonthDay,
    staff: &StaffConfigurations,
) -> SeasonalSettings {
    let policy = config.ended_recently();
    let mut out = SeasonalSettings::new();

    for (name, campaign) in &config.campaigns {
        let status = campaign_status(campaign, today, policy);
        if !status.is_live() {
            tracing::debug!("season {} is {:?}, skipping", name, status);
            continue;
        }
        let values = effective_values(
            name,
            campaign,
            &config.available_settings,
            &config.staff_configurations_settings,
            staff,
        );
        tracing::info!(
            "season {} is {:?} with {} settings",
            name,
            status,
            values.len()
        );
        out.insert(name.clone(), values);
    }

    out
}

fn campaign_status(campaign: &Campaign, today: MonthDay, policy: EndedRecentlyPolicy) -> EventStatus {
    event_status(today, campaign.start_date, campaign.end_date, policy)
}

fn effective_values(
    name: &str,
    campaign: &Campaign,
    available: &[String],
    global_overridable: &[String],
    staff: &StaffConfigurations,
) -> SeasonValues {
    let mut values: SeasonValues = available
        .iter()
        .filter_map(|var| campaign.settings.get(var).map(|v| (var.clone(), v.clone())))
        .collect();

    for variable in global_overridable
        .iter()
        .chain(&campaign.staff_configurations_settings)
    {
        if let Some(value) = staff.get(&override_key(name, variable)) {
            values.insert(variable.clone(), value.to_json());
        }
    }

    values
}
