//! CLI output formatting for every command.
//!
//! Output is a content inventory: what ended up in the artifact, then what
//! was left out and why. Diagnostics go through `tracing` on stderr; these
//! summaries go to stdout.
//!
//! # Output Format
//!
//! ## Generate
//!
//! ```text
//! Staff configurations (3 keys, from data store)
//! Latest news
//! 001 Event → /events/1/
//! 002 Happy Birthday, Rin! March 11 → /character/rin/
//! Share images (refreshed 2024-03-10T06:30:00Z)
//!     cards → /media/share/share-cards-1a2b3c4d5e6f.png
//!     events → none
//! Seasonal settings
//!     spring: site_logo
//! Donation month
//!     2024-03-01: 72% (720)
//!     donators: 7 this month, 42 total
//! Skipped
//!     events: not enough images: found 5, need 9
//!
//! Wrote generated_settings.txt
//! ```
//!
//! ## Map
//!
//! ```text
//! Map: 12 markers
//! Skipped
//!     user 3 (umi): invalid location: missing coordinates
//!
//! Wrote map.html
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::map::MapReport;
use crate::outcome::Skipped;
use crate::snapshot::Assembly;
use crate::types::Announcement;
use chrono::SecondsFormat;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// The text an announcement is recognized by: its title in the first
/// language, the staff title, or the URL.
fn announcement_label<'a>(announcement: &'a Announcement, language: Option<&str>) -> &'a str {
    language
        .and_then(|l| announcement.t_titles.get(l))
        .or_else(|| announcement.t_titles.values().next())
        .map(String::as_str)
        .or(announcement.title.as_deref())
        .unwrap_or(&announcement.url)
}

fn skipped_lines(skipped: &[Skipped]) -> Vec<String> {
    if skipped.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["Skipped".to_string()];
    lines.extend(skipped.iter().map(|s| format!("{}{}", indent(1), s)));
    lines
}

// ============================================================================
// Generate / check
// ============================================================================

/// Format a pipeline run. `language` picks which title to show.
pub fn format_assembly(assembly: &Assembly, language: Option<&str>) -> Vec<String> {
    let snapshot = &assembly.snapshot;
    let mut lines = Vec::new();

    let origin = if assembly.staff_from_existing {
        "supplied"
    } else {
        "from data store"
    };
    lines.push(format!(
        "Staff configurations ({} keys, {})",
        snapshot.staff_configurations.len(),
        origin
    ));

    lines.push("Latest news".to_string());
    if snapshot.latest_news.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, announcement) in snapshot.latest_news.iter().enumerate() {
        lines.push(format!(
            "{} {} → {}",
            format_index(i + 1),
            announcement_label(announcement, language),
            announcement.url
        ));
    }

    let cache = &snapshot.share_images;
    let when = cache
        .last_refresh
        .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_else(|| "never".to_string());
    let state = if assembly.share_images_refreshed {
        "refreshed"
    } else {
        "cached, last refresh"
    };
    lines.push(format!("Share images ({} {})", state, when));
    for (name, reference) in &cache.images {
        lines.push(format!(
            "{}{} → {}",
            indent(1),
            name,
            reference.as_deref().unwrap_or("none")
        ));
    }

    if !snapshot.seasonal_settings.is_empty() {
        lines.push("Seasonal settings".to_string());
        for (campaign, values) in &snapshot.seasonal_settings {
            let keys: Vec<&str> = values.keys().map(String::as_str).collect();
            lines.push(format!("{}{}: {}", indent(1), campaign, keys.join(", ")));
        }
    }

    let counts: Vec<String> = [
        (snapshot.donators_this_month, "this month"),
        (snapshot.total_donators, "total"),
    ]
    .into_iter()
    .filter_map(|(count, label)| count.map(|n| format!("{n} {label}")))
    .collect();
    if snapshot.donation_month.is_some() || !counts.is_empty() {
        lines.push("Donation month".to_string());
    }
    if let Some(month) = &snapshot.donation_month {
        lines.push(format!(
            "{}{}: {}% ({})",
            indent(1),
            month.date,
            month.percent_int,
            month.donations
        ));
    }
    if !counts.is_empty() {
        lines.push(format!("{}donators: {}", indent(1), counts.join(", ")));
    }

    if !snapshot.extra.is_empty() {
        let names: Vec<&str> = snapshot.extra.keys().map(String::as_str).collect();
        lines.push(format!("Extra values: {}", names.join(", ")));
    }

    lines.extend(skipped_lines(&assembly.skipped));
    lines
}

pub fn format_generate_output(
    assembly: &Assembly,
    language: Option<&str>,
    path: &Path,
) -> Vec<String> {
    let mut lines = format_assembly(assembly, language);
    lines.push(String::new());
    lines.push(format!("Wrote {}", path.display()));
    lines
}

pub fn print_generate_output(assembly: &Assembly, language: Option<&str>, path: &Path) {
    for line in format_generate_output(assembly, language, path) {
        println!("{}", line);
    }
}

pub fn print_check_output(assembly: &Assembly, language: Option<&str>) {
    for line in format_assembly(assembly, language) {
        println!("{}", line);
    }
}

// ============================================================================
// Map
// ============================================================================

pub fn format_map_output(report: &MapReport, path: &Path) -> Vec<String> {
    let mut lines = vec![format!("Map: {} markers", report.markers)];
    lines.extend(skipped_lines(&report.skipped));
    lines.push(String::new());
    lines.push(format!("Wrote {}", path.display()));
    lines
}

pub fn print_map_output(report: &MapReport, path: &Path) {
    for line in format_map_output(report, path) {
        println!("{}", line);
    }
}
