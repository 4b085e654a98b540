//! Diary publisher CLI
//!
//! Local execution entry point for ingestion, enrichment and site data.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use diary::{
    error::{AppError, Result},
    models::{Config, DiaryEntry, OgpRecord},
    pipeline,
    services::{DefaultImageTagger, ImageStore, LinkCache, LinkEnricher, NotionClient},
    storage::{
        LocalStorage, PREVIOUS_SNAPSHOT_KEY, SNAPSHOT_KEY, SnapshotStorage, write_json_file,
    },
    utils::{
        http::HttpFetcher,
        report::{LogReporter, summary},
    },
};

/// diary - Notion diary publisher
#[derive(Parser, Debug)]
#[command(
    name = "diary",
    version,
    about = "Fetches, diffs and enriches a Notion diary for static publishing"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the diary, store the snapshot and report changes
    Fetch {
        /// Reuse the stored snapshot when one exists
        #[arg(long)]
        use_cache: bool,
    },

    /// Apply link enrichment to the stored snapshot
    Enrich,

    /// Write search data for the static site
    Search,

    /// Regenerate all image derivatives
    Thumbnails,

    /// Validate configuration
    Validate,

    /// Show snapshot and cache status
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load the stored snapshot or fail with a hint.
fn require_snapshot(storage: &LocalStorage) -> Result<Vec<DiaryEntry>> {
    storage
        .load_snapshot()?
        .ok_or_else(|| AppError::config("No snapshot found. Run 'fetch' first."))
}

/// Main entry point for the CLI application.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = Config::load(&cli.config);
    let level = loaded.as_ref().map_or("info", |c| c.logging.level.as_str());
    init_logging(cli.verbose, level);

    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        );
        Config::default()
    });
    config.apply_env();

    let storage = LocalStorage::new(&config.paths.cache_dir);

    match cli.command {
        Command::Fetch { use_cache } => {
            config.validate()?;
            let cached = use_cache && storage.path(SNAPSHOT_KEY).exists();
            if !cached {
                config.require_credentials()?;
            }

            let source = NotionClient::new(&config.notion, &config.http.user_agent)?;
            let fetcher = HttpFetcher::from_config(&config.http)?;
            let store = ImageStore::new(fetcher, &config.paths.output_dir, &config.images);
            let mut tagger = DefaultImageTagger::new(store);
            let mut reporter = LogReporter;

            let outcome = pipeline::load_or_fetch(
                &source,
                &storage,
                &config,
                &mut tagger,
                &mut reporter,
                use_cache,
                Utc::now(),
            )?;

            let changes = match &outcome.diff {
                Some(pipeline::DiffOutcome::Changes(report)) => report.change_count().to_string(),
                Some(pipeline::DiffOutcome::FirstDownload) => "first download".to_string(),
                Some(pipeline::DiffOutcome::EmptySnapshot) => "empty snapshot".to_string(),
                None => "-".to_string(),
            };
            summary(
                "Fetch",
                &[
                    ("Source", if outcome.from_cache { "cache" } else { "notion" }.to_string()),
                    ("Entries", outcome.entries.len().to_string()),
                    ("Rows", outcome.stats.rows.to_string()),
                    ("Eligible", outcome.stats.eligible.to_string()),
                    ("Topics", outcome.stats.topics.to_string()),
                    ("Held back", outcome.stats.held_back.to_string()),
                    ("Changes", changes),
                ],
            );
        }

        Command::Enrich => {
            config.validate()?;
            let entries = require_snapshot(&storage)?;

            let fetcher = HttpFetcher::from_config(&config.http)?;
            let mut enricher = LinkEnricher::new(fetcher, &config.linkcard, &config.paths)?;
            let (enriched, stats) = pipeline::enrich_entries(&entries, &mut enricher)?;

            let output = config.paths.enriched_data_path();
            write_json_file(&output, &enriched)?;

            summary(
                "Enrich",
                &[
                    ("Entries", enriched.len().to_string()),
                    ("Links", stats.links.to_string()),
                    ("Link cards", stats.cards.to_string()),
                    ("Embeds", stats.embeds.to_string()),
                    ("Videos", stats.videos.to_string()),
                    ("Plain anchors", stats.fallbacks.to_string()),
                    ("Fetches", stats.fetches.to_string()),
                    ("Output", output.display().to_string()),
                ],
            );
        }

        Command::Search => {
            let entries = require_snapshot(&storage)?;
            let index = pipeline::write_search_files(&entries, &config.paths)?;

            summary(
                "Search",
                &[
                    ("Items", index.item_count.to_string()),
                    ("Tokens", index.token_count.to_string()),
                    ("Data", config.paths.search_data_path().display().to_string()),
                    ("Index", config.paths.search_index_path().display().to_string()),
                ],
            );
        }

        Command::Thumbnails => {
            config.validate()?;
            let fetcher = HttpFetcher::from_config(&config.http)?;
            let store = ImageStore::new(fetcher, &config.paths.output_dir, &config.images);
            let count = store.regenerate_all()?;

            summary(
                "Thumbnails",
                &[
                    ("Images", count.to_string()),
                    ("Sizes", config.images.sizes.len().to_string()),
                ],
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            match config.require_credentials() {
                Ok(()) => log::info!("✓ Credentials present"),
                Err(e) => log::warn!("{}", e),
            }
        }

        Command::Info => {
            log::info!("Cache directory: {}", config.paths.cache_dir.display());
            log::info!("Output directory: {}", config.paths.output_dir.display());

            match storage.load_snapshot() {
                Ok(Some(entries)) => {
                    let topics: usize = entries.iter().map(|e| e.topics.len()).sum();
                    log::info!("Snapshot: {} entries, {} topics", entries.len(), topics);
                    if let (Some(first), Some(last)) = (
                        entries.iter().map(|e| &e.date).min(),
                        entries.iter().map(|e| &e.date).max(),
                    ) {
                        log::info!("Dates: {} .. {}", first, last);
                    }
                }
                Ok(None) => log::info!("No snapshot found yet."),
                Err(e) => log::warn!("Snapshot is unreadable: {}", e),
            }
            log::info!(
                "Previous snapshot: {}",
                if storage.path(PREVIOUS_SNAPSHOT_KEY).exists() {
                    "exists"
                } else {
                    "not found"
                }
            );

            let ogp: LinkCache<OgpRecord> = LinkCache::load(config.paths.ogp_cache_path());
            let embeds: LinkCache<serde_json::Value> =
                LinkCache::load(config.paths.embed_cache_path());
            log::info!("OGP cache: {} entries", ogp.len());
            log::info!("Embed cache: {} entries", embeds.len());
        }
    }

    log::info!("Done!");

    Ok(())
}
