//! User map page.
//!
//! Renders an HTML fragment with one marker per user who entered a location.
//! Markers are embedded as a JSON array in an inline script, picked up by
//! `static/js/map.js`:
//!
//! ```text
//! <div id="map-title">…</div>
//! <div id="map"></div>
//! <script>var center=…;var zoom=2;var addresses=[{"user_id":1,…}];</script>
//! <script src="/static/js/map.js?1"></script>
//! ```
//!
//! A user whose record cannot be read or whose marker cannot be built
//! (empty username, coordinates missing or out of range) is skipped and
//! logged; the rest of the page is still
//! written. The page is published with the same atomic replace as the
//! settings artifact.

use crate::config::MapConfig;
use crate::outcome::{Collected, SkipReason, Skipped};
use crate::snapshot::write_atomic;
use crate::sources::{SourceError, UserDirectory, UserRecord};
use maud::{Markup, PreEscaped, html};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One pin on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub user_id: u64,
    pub username: String,
    pub avatar: String,
    pub location: String,
    /// User search for the same location.
    pub location_url: String,
    pub icon: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Build the marker for `user`.
pub fn marker_for(user: &UserRecord, config: &MapConfig) -> Result<MapMarker, SkipReason> {
    if user.username.trim().is_empty() {
        return Err(SkipReason::MissingName);
    }
    let (Some(latitude), Some(longitude)) = (user.latitude, user.longitude) else {
        return Err(SkipReason::InvalidLocation("missing coordinates".to_string()));
    };
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(SkipReason::InvalidLocation(format!(
            "{}, {} is out of range",
            latitude, longitude
        )));
    }

    let location = user.location.clone().unwrap_or_default();
    let icon = match user.favorite_character_image.as_deref() {
        Some(image) if !image.is_empty() => image.to_string(),
        _ => format!("{}{}", config.static_url, config.default_icon),
    };

    Ok(MapMarker {
        user_id: user.id,
        username: user.username.clone(),
        avatar: user.avatar.clone().unwrap_or_default(),
        location_url: format!(
            "{}?location={}",
            config.location_search_path,
            urlencoding::encode(&location)
        ),
        location,
        icon,
        latitude,
        longitude,
    })
}

/// Markers for every user, in input order.
pub fn collect_markers(users: &[UserRecord], config: &MapConfig) -> Collected<MapMarker> {
    let mut out = Collected::default();
    for user in users {
        match marker_for(user, config) {
            Ok(marker) => out.push(marker),
            Err(reason) => out.skip(format!("user {} ({})", user.id, user.username), reason),
        }
    }
    out
}

/// JSON for embedding inside a `<script>` element.
///
/// `<`, `>` and `&` are escaped so user-provided text cannot close the script.
fn script_json<T: Serialize>(value: &T) -> Result<String, MapError> {
    Ok(serde_json::to_string(value)?
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

/// Render the map fragment.
pub fn render_map_page(
    markers: &[MapMarker],
    config: &MapConfig,
    title: &str,
) -> Result<Markup, MapError> {
    let script = format!(
        "var center={};var zoom={};var addresses={};",
        script_json(&serde_json::json!({"lat": config.center[0], "lng": config.center[1]}))?,
        config.zoom,
        script_json(&markers)?
    );
    let map_js = format!(
        "{}static/js/map.js?{}",
        config.static_url, config.static_version
    );

    Ok(html! {
        div.padding15 #map-title {
            h1 { (title) }
        }
        div #map {}
        script { (PreEscaped(script)) }
        script src=(map_js) {}
    })
}

/// Result of [`generate_map`].
#[derive(Debug, Clone, PartialEq)]
pub struct MapReport {
    pub markers: usize,
    pub skipped: Vec<Skipped>,
}

/// Render the map page from the user directory and publish it at `path`.
pub fn generate_map(
    directory: &dyn UserDirectory,
    config: &MapConfig,
    title: &str,
    path: &Path,
) -> Result<MapReport, MapError> {
    let users = directory.users_with_location()?;
    let mut collected = collect_markers(&users.items, config);
    let mut skipped = users.skipped;
    skipped.append(&mut collected.skipped);
    collected.skipped = skipped;
    let page = render_map_page(&collected.items, config, title)?;

    write_atomic(path, &page.into_string()).map_err(|source| MapError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        "wrote map with {} markers to {} ({} skipped)",
        collected.items.len(),
        path.display(),
        collected.skipped.len()
    );

    Ok(MapReport {
        markers: collected.items.len(),
        skipped: collected.skipped,
    })
}
