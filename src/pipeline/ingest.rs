// src/pipeline/ingest.rs

//! Ingestion cycle: fetch, segment, persist and diff.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Config, DiaryEntry};
use crate::pipeline::diff::{DiffOutcome, diff_snapshots, report_outcome};
use crate::services::notion::{ContentSource, filter_rows};
use crate::services::segment::{ImageTagger, Segmenter, retain_settled};
use crate::storage::SnapshotStorage;
use crate::utils::report::Reporter;

/// Counters for one fetch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Rows returned by the database query
    pub rows: usize,
    /// Rows that passed the publication filter
    pub eligible: usize,
    /// Topics kept after segmentation and the recency filter
    pub topics: usize,
    /// Topics held back because they were edited too recently
    pub held_back: usize,
}

/// Result of [`load_or_fetch`].
#[derive(Debug)]
pub struct IngestOutcome {
    pub entries: Vec<DiaryEntry>,
    /// Whether the entries came from the stored snapshot
    pub from_cache: bool,
    pub stats: IngestStats,
    /// Diff against the previous snapshot (fresh fetches only)
    pub diff: Option<DiffOutcome>,
}

/// Fetch every eligible page and segment it into entries.
///
/// Any API error aborts the whole fetch.
pub fn fetch_entries<S: ContentSource + ?Sized>(
    source: &S,
    config: &Config,
    tagger: &mut dyn ImageTagger,
    now: DateTime<Utc>,
) -> Result<(Vec<DiaryEntry>, IngestStats)> {
    let rows = source.query_rows(&config.notion.database_id)?;
    let eligible = filter_rows(&rows, &config.notion);
    log::info!("{} of {} rows are eligible", eligible.len(), rows.len());

    let mut stats = IngestStats {
        rows: rows.len(),
        eligible: eligible.len(),
        ..Default::default()
    };

    let segmenter = Segmenter::new(source, &config.segment)?;
    let grace = config.segment.grace();
    let mut entries: Vec<DiaryEntry> = Vec::with_capacity(eligible.len());

    for row in eligible {
        if entries.iter().any(|e| e.date == row.date) {
            log::warn!("Duplicate diary date {} (page {}), skipping", row.date, row.page_id);
            continue;
        }

        let blocks = source.block_children(&row.page_id)?;
        let topics = segmenter.segment(&blocks, tagger);
        let segmented = topics.len();
        let topics = retain_settled(topics, now, grace);

        stats.held_back += segmented - topics.len();
        stats.topics += topics.len();
        log::info!("Fetched {} ({} topics)", row.date, topics.len());

        entries.push(DiaryEntry {
            date: row.date,
            index_direction: row.index_direction,
            topics,
        });
    }

    Ok((entries, stats))
}

/// Load the stored snapshot, or run a full ingestion cycle.
///
/// With `use_cache` and an existing snapshot nothing is fetched. Otherwise the
/// fresh entries replace the snapshot (after rotating it) and the change
/// report goes to `reporter`. A failed fetch leaves both snapshots untouched.
pub fn load_or_fetch<S: ContentSource + ?Sized>(
    source: &S,
    storage: &dyn SnapshotStorage,
    config: &Config,
    tagger: &mut dyn ImageTagger,
    reporter: &mut dyn Reporter,
    use_cache: bool,
    now: DateTime<Utc>,
) -> Result<IngestOutcome> {
    if use_cache {
        if let Some(entries) = storage.load_snapshot()? {
            reporter.info(&format!("Loaded {} entries from cache", entries.len()));
            return Ok(IngestOutcome {
                entries,
                from_cache: true,
                stats: IngestStats::default(),
                diff: None,
            });
        }
        reporter.info("No cached snapshot, fetching from Notion");
    } else {
        reporter.info("Fetching diary from Notion");
    }

    let (entries, stats) = fetch_entries(source, config, tagger, now)?;

    let rotated = storage.rotate_snapshot()?;
    storage.store_snapshot(&entries)?;

    let previous = if rotated {
        match storage.load_previous() {
            Ok(previous) => previous,
            Err(e) => {
                reporter.warn(&format!("Previous snapshot is unreadable: {e}"));
                None
            }
        }
    } else {
        None
    };

    let diff = diff_snapshots(previous.as_deref(), &entries);
    report_outcome(&diff, reporter);
    reporter.info(&format!(
        "Stored {} entries ({} topics, {} held back)",
        entries.len(),
        stats.topics,
        stats.held_back
    ));

    Ok(IngestOutcome {
        entries,
        from_cache: false,
        stats,
        diff: Some(diff),
    })
}
