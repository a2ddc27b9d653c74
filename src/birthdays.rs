//! Birthday announcements.
//!
//! Two flows produce [`Announcement`]s for the front page:
//!
//! - **Character birthdays**: every entity whose yearly date falls inside the
//!   [`BirthdayWindow`] gets its own entry, titled in every configured
//!   language ("Happy Birthday, Rin! March 7"), sorted by date.
//! - **User birthdays**: all users born today share a single entry listing up
//!   to `max_usernames` names (highest reputation first) plus "+ N" for the
//!   rest.
//!
//! An entity that cannot be rendered (no name, no image, no locale data) is
//! skipped and reported in [`Collected::skipped`]; the rest of the batch
//! still goes through.

use crate::config::BirthdaysConfig;
use crate::date_window::{BirthdayWindow, MonthDay};
use crate::i18n::Translator;
use crate::outcome::{Collected, SkipReason};
use crate::sources::{CalendarEntity, EntitySource, UserDirectory, UserRecord};
use crate::types::{Announcement, Visual};
use std::collections::BTreeMap;

/// Date field character birthdays are read from.
pub const DEFAULT_DATE_FIELD: &str = "birthday";

const HAPPY_BIRTHDAY: &str = "Happy Birthday";

const CHARACTER_CSS: &str = "birthday";
const USERS_CSS: &str = "birthday font0-5";

/// Render one title per language, failing on the first locale without data.
fn render_titles(
    languages: &[String],
    render: impl Fn(&str) -> Option<String>,
) -> Result<BTreeMap<String, String>, SkipReason> {
    languages
        .iter()
        .map(|locale| {
            render(locale)
                .map(|title| (locale.clone(), title))
                .ok_or_else(|| SkipReason::MissingLocaleData(locale.clone()))
        })
        .collect()
}

/// Announcements for entities whose `field` date is near `today`.
pub fn character_birthdays<E: CalendarEntity>(
    entities: &[E],
    field: &str,
    today: MonthDay,
    window: BirthdayWindow,
    languages: &[String],
    translator: &dyn Translator,
) -> Collected<Announcement> {
    let mut out = Collected::default();

    let mut dated: Vec<(MonthDay, &E)> = Vec::new();
    for entity in entities {
        match entity.reference_date(field) {
            Some(date) if window.contains(today, date) => dated.push((date, entity)),
            Some(_) => {}
            None => out.skip(label(entity), SkipReason::MissingDate),
        }
    }
    dated.sort_by(|(a, ea), (b, eb)| {
        a.ordinal()
            .cmp(&b.ordinal())
            .then(a.day().cmp(&b.day()))
            .then_with(|| ea.display_name().cmp(&eb.display_name()))
    });

    for (date, entity) in dated {
        let Some(name) = entity.display_name() else {
            out.skip(label(entity), SkipReason::MissingName);
            continue;
        };
        let Some(image) = entity.image() else {
            out.skip(name, SkipReason::MissingImage);
            continue;
        };
        let titles = render_titles(languages, |locale| {
            let greeting = translator.translate(locale, HAPPY_BIRTHDAY)?;
            let day = translator.month_day(locale, date)?;
            Some(format!("{greeting}, {name}! {day}"))
        });
        match titles {
            Ok(t_titles) => out.push(Announcement {
                t_titles,
                title: None,
                visual: Visual::Background(image.to_string()),
                url: entity.url().unwrap_or_default().to_string(),
                hide_title: false,
                ajax: false,
                css_classes: CHARACTER_CSS.to_string(),
                extra: BTreeMap::new(),
            }),
            Err(reason) => out.skip(name, reason),
        }
    }
    out
}

fn label(entity: &impl CalendarEntity) -> String {
    entity.display_name().unwrap_or("<unnamed>").to_string()
}

/// `"a, b, c, d + 3"` for the first `max` usernames and the overflow count.
fn username_list(users: &[UserRecord], max: usize) -> String {
    let shown: Vec<&str> = users.iter().take(max).map(|u| u.username.as_str()).collect();
    let rest = users.len().saturating_sub(max);
    if rest > 0 {
        format!("{} + {}", shown.join(", "), rest)
    } else {
        shown.join(", ")
    }
}

/// Single announcement for every user born today, or nothing.
pub fn user_birthdays(
    mut users: Vec<UserRecord>,
    config: &BirthdaysConfig,
    languages: &[String],
    translator: &dyn Translator,
) -> Collected<Announcement> {
    let mut out = Collected::default();
    if users.is_empty() {
        return out;
    }
    users.sort_by(|a, b| b.reputation.cmp(&a.reputation));

    let usernames = username_list(&users, config.max_usernames);
    let titles = render_titles(languages, |locale| {
        let greeting = translator.translate(locale, HAPPY_BIRTHDAY)?;
        Some(format!("{greeting} 🎂🎉 {usernames}"))
    });

    let url = match users.as_slice() {
        [only] => only.item_url.clone(),
        _ => {
            let ids: Vec<String> = users.iter().map(|u| u.id.to_string()).collect();
            format!(
                "{}?ids={}&ordering={}&reverse_order=on",
                config.user_listing_path,
                ids.join(","),
                config.user_listing_ordering
            )
        }
    };

    match titles {
        Ok(t_titles) => out.push(Announcement {
            t_titles,
            title: None,
            visual: Visual::Image(config.user_image.clone()),
            url,
            hide_title: false,
            ajax: false,
            css_classes: USERS_CSS.to_string(),
            extra: BTreeMap::new(),
        }),
        Err(reason) => out.skip(usernames, reason),
    }
    out
}

/// Run both birthday flows against the data sources.
///
/// A source that fails to answer contributes nothing and is reported as
/// skipped.
pub fn collect_birthdays(
    characters: Option<&dyn EntitySource>,
    users: Option<&dyn UserDirectory>,
    today: MonthDay,
    config: &BirthdaysConfig,
    languages: &[String],
    translator: &dyn Translator,
) -> Collected<Announcement> {
    let mut out = Collected::default();
    let window = config.window();

    if let Some(source) = characters {
        match source.entities_within(DEFAULT_DATE_FIELD, today, window) {
            Ok(entities) => {
                out.skipped.extend(entities.skipped);
                out.extend(character_birthdays(
                    &entities.items,
                    DEFAULT_DATE_FIELD,
                    today,
                    window,
                    languages,
                    translator,
                ));
            }
            Err(e) => out.skip("characters", SkipReason::SourceUnavailable(e.to_string())),
        }
    }

    if let Some(directory) = users {
        match directory.users_born_on(today) {
            Ok(born_today) => {
                out.skipped.extend(born_today.skipped);
                out.extend(user_birthdays(born_today.items, config, languages, translator));
            }
            Err(e) => out.skip("users", SkipReason::SourceUnavailable(e.to_string())),
        }
    }

    tracing::info!(
        "collected {} birthday announcements ({} skipped)",
        out.items.len(),
        out.skipped.len()
    );
    out
}
