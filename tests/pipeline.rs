//! End-to-end runs against a JSON data directory and real PNG tiles.

use chrono::{DateTime, Duration, TimeZone, Utc};
use image::{Rgb, RgbImage};
use serde_json::json;
use settings_gen::config::GeneratorConfig;
use settings_gen::datastore::JsonStore;
use settings_gen::i18n::MessageCatalog;
use settings_gen::imaging::{Compositor, DryRunCompositor, GridCompositor};
use settings_gen::map;
use settings_gen::outcome::SkipReason;
use settings_gen::share_images::{CollectionRegistry, ShareImageCache};
use settings_gen::snapshot::{self, Assembly, ExistingValues, SnapshotError, Sources};
use settings_gen::types::Visual;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 6, 30, 0).unwrap()
}

fn write_json(path: &Path, value: serde_json::Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

/// Data directory, media tiles and config rooted in one temp dir.
struct Site {
    tmp: TempDir,
    config: GeneratorConfig,
}

impl Site {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");

        write_json(
            &data.join("staff_configurations.json"),
            json!([
                {"key": "site_name", "value": "Sample"},
                {"key": "motd", "value": "Hello", "is_localized": true, "locale": "en"},
                {"key": "motd", "value": "Bonjour", "is_localized": true, "locale": "fr"},
                {"key": "banner_1_image", "value": "/b1.png"},
                {"key": "banner_1_title", "value": "Event"},
                {"key": "banner_1_url", "value": "/events/1/"},
                {"key": "banner_2_image", "value": "/b2.png"}
            ]),
        );
        write_json(
            &data.join("characters.json"),
            json!([
                {"name": "Rin", "image": "/rin.png", "url": "/character/rin/", "dates": {"birthday": "03-11"}},
                {"name": "Eli", "image": "/eli.png", "dates": {"birthday": "10-21"}},
                {"name": "Maki", "dates": {"birthday": "03-12"}}
            ]),
        );
        write_json(
            &data.join("users.json"),
            json!([
                {"id": 4, "username": "kotori", "item_url": "/user/4/kotori/",
                 "birthdate": "1999-03-10", "reputation": 3},
                {"id": 5, "username": "umi", "item_url": "/user/5/umi/",
                 "location": "Tokyo, Japan", "latitude": 35.68, "longitude": 139.69},
                {"id": 6, "username": "", "item_url": "/user/6/",
                 "latitude": 1.0, "longitude": 1.0}
            ]),
        );
        write_json(
            &data.join("donations.json"),
            json!({
                "months": [{"date": "2024-03-01", "percent": 72.5, "donations": 725, "donators": [1, 2]}],
                "donators": 12
            }),
        );

        let media = tmp.path().join("media");
        let items: Vec<serde_json::Value> = (0..10)
            .map(|i| {
                let name = format!("cards/{i}.png");
                let file = media.join(&name);
                fs::create_dir_all(file.parent().unwrap()).unwrap();
                RgbImage::from_pixel(16, 12, Rgb([i as u8 * 20, 40, 80]))
                    .save(&file)
                    .unwrap();
                json!({"id": i, "image": format!("/{name}")})
            })
            .collect();
        write_json(
            &data.join("collections/cards.json"),
            json!({"auto_share_image": true, "ordering": ["-id"], "items": items}),
        );
        write_json(
            &data.join("collections/links.json"),
            json!({"auto_share_image": false, "items": []}),
        );

        let mut config = GeneratorConfig::default();
        config.share_images.tile_size = 8;
        config.share_images.media_root = media.display().to_string();
        config.share_images.output_dir = media.join("share").display().to_string();

        Self { tmp, config }
    }

    fn store(&self) -> JsonStore {
        JsonStore::new(self.tmp.path().join("data"))
    }

    fn artifact_path(&self) -> PathBuf {
        self.tmp.path().join("out/generated_settings.txt")
    }

    fn compositor(&self) -> GridCompositor {
        let share = &self.config.share_images;
        GridCompositor::new(&share.media_root, &share.output_dir, &share.public_prefix)
    }

    fn assemble_with(
        &self,
        compositor: &dyn Compositor,
        existing: &ExistingValues,
        previous: &ShareImageCache,
        at: DateTime<Utc>,
    ) -> Assembly {
        let store = self.store();
        let collections: CollectionRegistry = store.collections().unwrap();
        let catalog = MessageCatalog::new(self.config.translations.clone());
        let sources = Sources {
            config: Some(&store),
            characters: Some(&store),
            users: Some(&store),
            donations: Some(&store),
            collections: &collections,
            compositor,
            translator: &catalog,
        };
        snapshot::assemble(&self.config, &sources, existing, previous, at).unwrap()
    }

    /// One scheduled run: read the previous cache, assemble, publish.
    fn run_at(&self, at: DateTime<Utc>) -> Assembly {
        let previous = snapshot::load_previous_cache(&self.artifact_path());
        let assembly = self.assemble_with(
            &self.compositor(),
            &ExistingValues::new(),
            &previous,
            at,
        );
        snapshot::publish(&assembly.snapshot, &self.artifact_path()).unwrap();
        assembly
    }
}

// =========================================================================
// Full generation
// =========================================================================

#[test]
fn first_run_collects_and_publishes_everything() {
    let site = Site::new();
    let assembly = site.run_at(now());
    let snap = &assembly.snapshot;

    assert!(snap.staff_configurations.contains_key("site_name"));
    assert!(snap.staff_configurations.contains_key("motd"));

    // Incomplete banner 2 is dropped; Maki has no image
    assert_eq!(snap.latest_news.len(), 3);
    assert_eq!(snap.latest_news[0].title.as_deref(), Some("Event"));
    assert_eq!(
        snap.latest_news[1].t_titles["en"],
        "Happy Birthday, Rin! March 11"
    );
    assert_eq!(snap.latest_news[1].visual, Visual::Background("/rin.png".into()));
    assert_eq!(snap.latest_news[2].url, "/user/4/kotori/");
    assert!(assembly.skipped.iter().any(|s| s.item == "Maki"));

    assert!(assembly.share_images_refreshed);
    assert_eq!(snap.share_images.last_refresh, Some(now()));
    let reference = snap.share_images.images["cards"].clone().unwrap();
    assert!(reference.starts_with("/media/share/share-cards-"));
    let file = Path::new(&site.config.share_images.output_dir)
        .join(reference.trim_start_matches("/media/share/"));
    assert_eq!(image::image_dimensions(&file).unwrap(), (24, 24));
    assert!(!snap.share_images.images.contains_key("links"));

    let donation = snap.donation_month.as_ref().unwrap();
    assert_eq!(donation.percent_int, 72);
    assert_eq!(snap.donators_this_month, Some(2));
    assert_eq!(snap.total_donators, Some(12));

    let text = fs::read_to_string(site.artifact_path()).unwrap();
    assert!(text.starts_with('#'));
    assert!(text.trim_end().lines().last().unwrap().starts_with("GENERATED_DATE = "));
}

#[test]
fn published_artifact_reads_back_as_same_snapshot() {
    let site = Site::new();
    let assembly = site.run_at(now());

    let text = fs::read_to_string(site.artifact_path()).unwrap();
    let parsed = snapshot::parse_artifact(&text).unwrap();
    assert_eq!(parsed.into_snapshot().unwrap(), assembly.snapshot);
}

#[test]
fn rerun_on_same_inputs_is_byte_identical() {
    let site = Site::new();
    site.run_at(now());
    let first = fs::read_to_string(site.artifact_path()).unwrap();
    site.run_at(now());
    let second = fs::read_to_string(site.artifact_path()).unwrap();
    assert_eq!(first, second);
}

// =========================================================================
// Share-image cache across runs
// =========================================================================

#[test]
fn share_images_reused_within_a_week_then_refreshed_in_place() {
    let site = Site::new();
    let first = site.run_at(now());
    let reference = first.snapshot.share_images.images["cards"].clone();

    let next_day = site.run_at(now() + Duration::days(1));
    assert!(!next_day.share_images_refreshed);
    assert_eq!(next_day.snapshot.share_images.last_refresh, Some(now()));
    assert_eq!(next_day.snapshot.share_images.images["cards"], reference);

    let later = now() + Duration::days(8);
    let next_week = site.run_at(later);
    assert!(next_week.share_images_refreshed);
    assert_eq!(next_week.snapshot.share_images.last_refresh, Some(later));
    assert_eq!(next_week.snapshot.share_images.images["cards"], reference);

    let share_files = fs::read_dir(&site.config.share_images.output_dir)
        .unwrap()
        .count();
    assert_eq!(share_files, 1);
}

#[test]
fn corrupt_previous_artifact_forces_refresh() {
    let site = Site::new();
    fs::create_dir_all(site.artifact_path().parent().unwrap()).unwrap();
    fs::write(site.artifact_path(), "not an artifact\n").unwrap();

    let assembly = site.run_at(now());
    assert!(assembly.share_images_refreshed);
}

// =========================================================================
// Existing values
// =========================================================================

#[test]
fn supplied_values_take_precedence() {
    let site = Site::new();
    let existing: ExistingValues = serde_json::from_value(json!({
        "STAFF_CONFIGURATIONS": {"site_name": "Supplied"},
        "LATEST_NEWS": [{"image": "/pinned.png", "url": "/pinned/"}],
        "EXTRA_FLAG": true
    }))
    .unwrap();
    let assembly = site.assemble_with(
        &site.compositor(),
        &existing,
        &ShareImageCache::default(),
        now(),
    );
    let snap = &assembly.snapshot;

    assert!(assembly.staff_from_existing);
    assert_eq!(snap.staff_configurations.len(), 1);
    // Pinned entry first, no staff banner, birthdays appended
    assert_eq!(snap.latest_news[0].url, "/pinned/");
    assert!(snap.latest_news.iter().all(|a| a.title.as_deref() != Some("Event")));
    assert_eq!(snap.latest_news.len(), 3);
    assert_eq!(snap.extra["EXTRA_FLAG"], json!(true));
}

#[test]
fn null_in_supplied_staff_configurations_is_ignored() {
    let site = Site::new();
    let existing: ExistingValues = serde_json::from_value(json!({
        "STAFF_CONFIGURATIONS": {"site_name": "X", "season_spring_site_logo": null}
    }))
    .unwrap();
    let assembly = site.assemble_with(
        &site.compositor(),
        &existing,
        &ShareImageCache::default(),
        now(),
    );
    assert_eq!(assembly.snapshot.staff_configurations.len(), 1);
    assert!(assembly.staff_from_existing);
}

#[test]
fn malformed_supplied_value_is_rejected_before_writing() {
    let site = Site::new();
    let store = site.store();
    let collections = store.collections().unwrap();
    let catalog = MessageCatalog::new(site.config.translations.clone());
    let compositor = site.compositor();
    let sources = Sources {
        config: Some(&store),
        characters: Some(&store),
        users: Some(&store),
        donations: Some(&store),
        collections: &collections,
        compositor: &compositor,
        translator: &catalog,
    };
    let existing: ExistingValues =
        serde_json::from_value(json!({"DONATION_MONTH": "lots"})).unwrap();

    let result = snapshot::assemble(
        &site.config,
        &sources,
        &existing,
        &ShareImageCache::default(),
        now(),
    );
    assert!(matches!(result, Err(SnapshotError::InvalidValue { .. })));
    assert!(!site.artifact_path().exists());
}

// =========================================================================
// Dry run and publish failures
// =========================================================================

#[test]
fn dry_run_writes_no_files() {
    let site = Site::new();
    let dry = DryRunCompositor(site.compositor());
    let assembly = site.assemble_with(
        &dry,
        &ExistingValues::new(),
        &ShareImageCache::default(),
        now(),
    );

    assert!(assembly.snapshot.share_images.images["cards"].is_some());
    assert!(!Path::new(&site.config.share_images.output_dir).exists());
}

#[test]
fn failed_publish_keeps_previous_artifact() {
    let site = Site::new();
    let assembly = site.run_at(now());
    let before = fs::read_to_string(site.artifact_path()).unwrap();

    let blocked = site.tmp.path().join("blocker");
    fs::write(&blocked, "file, not a directory").unwrap();
    let result = snapshot::publish(&assembly.snapshot, &blocked.join("settings.txt"));
    assert!(matches!(result, Err(SnapshotError::Write { .. })));
    assert_eq!(fs::read_to_string(site.artifact_path()).unwrap(), before);
}

// =========================================================================
// Map page
// =========================================================================

#[test]
fn map_page_from_data_directory() {
    let site = Site::new();
    let path = site.tmp.path().join("out/map.html");
    let report = map::generate_map(&site.store(), &site.config.map, "Map", &path).unwrap();

    assert_eq!(report.markers, 1);
    assert_eq!(report.skipped.len(), 1);
    let html = fs::read_to_string(&path).unwrap();
    assert!(html.contains(r#""username":"umi""#));
    assert!(html.contains("location=Tokyo%2C%20Japan"));
}

#[test]
fn undecodable_records_skipped_run_still_publishes() {
    let site = Site::new();
    let data = site.tmp.path().join("data");
    write_json(
        &data.join("characters.json"),
        json!([
            {"name": "Ghost", "image": "/g.png", "dates": {"birthday": "02-30"}},
            {"name": "Rin", "image": "/rin.png", "url": "/character/rin/", "dates": {"birthday": "03-11"}}
        ]),
    );
    write_json(
        &data.join("users.json"),
        json!([
            {"id": 4, "username": "kotori", "item_url": "/user/4/kotori/",
             "birthdate": "1999-03-10", "latitude": "abc"},
            {"id": 5, "username": "umi", "item_url": "/user/5/umi/",
             "location": "Tokyo, Japan", "latitude": 35.68, "longitude": 139.69}
        ]),
    );

    let assembly = site.run_at(now());
    let titles: Vec<&str> = assembly
        .snapshot
        .latest_news
        .iter()
        .filter_map(|a| a.t_titles.get("en").map(String::as_str))
        .collect();
    assert_eq!(titles, vec!["Happy Birthday, Rin! March 11"]);
    let invalid: Vec<&str> = assembly
        .skipped
        .iter()
        .filter(|s| matches!(s.reason, SkipReason::InvalidRecord(_)))
        .map(|s| s.item.as_str())
        .collect();
    assert_eq!(invalid, vec!["characters.json[0] (Ghost)", "users.json[0] (kotori)"]);
    assert!(site.artifact_path().exists());

    let path = site.tmp.path().join("out/map.html");
    let report = map::generate_map(&site.store(), &site.config.map, "Map", &path).unwrap();
    assert_eq!(report.markers, 1);
    assert_eq!(report.skipped[0].item, "users.json[0] (kotori)");
}
