use chrono::Utc;
use clap::{Parser, Subcommand};
use settings_gen::config::{self, GeneratorConfig};
use settings_gen::datastore::JsonStore;
use settings_gen::i18n::MessageCatalog;
use settings_gen::imaging::{Compositor, DryRunCompositor, GridCompositor};
use settings_gen::share_images::CollectionRegistry;
use settings_gen::snapshot::{self, Assembly, ExistingValues, Sources};
use settings_gen::{map, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "settings-gen")]
#[command(about = "Generate a community site's precomputed settings")]
#[command(long_about = "\
Generate a community site's precomputed settings

Meant to run periodically (every few hours). Each run merges staff
configuration records, collects banner and birthday announcements, refreshes
weekly share images, resolves running seasonal campaigns and writes all of it
to one settings artifact.

Data directory layout:

  data/
  ├── staff_configurations.json    # [{key, value, is_localized, locale}]
  ├── characters.json              # [{name, image, url, dates: {birthday: \"MM-DD\"}}]
  ├── users.json                   # [{id, username, item_url, birthdate, latitude, ...}]
  ├── donations.json               # {months: [...], donators: N}
  └── collections/                 # One file per share-image collection
      └── cards.json               # {auto_share_image, ordering, items: [...]}

Every file is optional; a missing one contributes nothing.

Set RUST_LOG=debug for detailed diagnostics.
Run 'settings-gen gen-config' to generate a documented settings-gen.toml.")]
#[command(version)]
struct Cli {
    /// Generator config file
    #[arg(long, default_value = "settings-gen.toml", global = true)]
    config: PathBuf,

    /// Data directory
    #[arg(long, default_value = "data", global = true)]
    data: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline and publish the settings artifact
    Generate {
        /// JSON object of artifact values that take precedence over computed ones
        #[arg(long)]
        existing: Option<PathBuf>,
        /// Artifact path (overrides `output` in the config)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Render and publish the user map page
    Map {
        /// Page path (overrides `map_output` in the config)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Page heading
        #[arg(long, default_value = "Map")]
        title: String,
    },
    /// Report what a run would publish without writing anything
    Check,
    /// Print a stock settings-gen.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            existing,
            output: target,
        } => {
            let config = config::load_config(&cli.config)?;
            let store = JsonStore::new(&cli.data);
            let collections = store.collections()?;
            let existing = load_existing(existing.as_deref())?;
            let path = target.unwrap_or_else(|| PathBuf::from(&config.output));
            let compositor = grid_compositor(&config);

            let assembly = run(&config, &store, &collections, &compositor, &existing, &path)?;
            snapshot::publish(&assembly.snapshot, &path)?;
            output::print_generate_output(&assembly, first_language(&config), &path);
        }
        Command::Map {
            output: target,
            title,
        } => {
            let config = config::load_config(&cli.config)?;
            let store = JsonStore::new(&cli.data);
            let path = target.unwrap_or_else(|| PathBuf::from(&config.map_output));
            let report = map::generate_map(&store, &config.map, &title, &path)?;
            output::print_map_output(&report, &path);
        }
        Command::Check => {
            let config = config::load_config(&cli.config)?;
            println!("==> Checking {}", cli.data.display());
            let store = JsonStore::new(&cli.data);
            let collections = store.collections()?;
            let compositor = DryRunCompositor(grid_compositor(&config));
            let path = PathBuf::from(&config.output);

            let assembly = run(
                &config,
                &store,
                &collections,
                &compositor,
                &ExistingValues::new(),
                &path,
            )?;
            output::print_check_output(&assembly, first_language(&config));
            println!("==> Data is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Assemble one snapshot from the JSON store, reusing the share-image cache
/// of the artifact currently at `path`.
fn run(
    config: &GeneratorConfig,
    store: &JsonStore,
    collections: &CollectionRegistry,
    compositor: &dyn Compositor,
    existing: &ExistingValues,
    path: &Path,
) -> Result<Assembly, snapshot::SnapshotError> {
    let catalog = MessageCatalog::new(config.translations.clone());
    let previous = snapshot::load_previous_cache(path);
    let sources = Sources {
        config: Some(store),
        characters: Some(store),
        users: Some(store),
        donations: Some(store),
        collections,
        compositor,
        translator: &catalog,
    };
    snapshot::assemble(config, &sources, existing, &previous, Utc::now())
}

fn grid_compositor(config: &GeneratorConfig) -> GridCompositor {
    let share = &config.share_images;
    GridCompositor::new(&share.media_root, &share.output_dir, &share.public_prefix)
}

fn first_language(config: &GeneratorConfig) -> Option<&str> {
    config.languages.first().map(String::as_str)
}

/// Read caller-supplied artifact values from a JSON object file.
fn load_existing(path: Option<&Path>) -> Result<ExistingValues, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(ExistingValues::new());
    };
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
