//! Pipeline entry points for diary operations.
//!
//! - `load_or_fetch`: One ingestion cycle (fetch, segment, store, diff)
//! - `enrich_entries`: Link enrichment for presentation
//! - `write_search_files`: Search data for the static site

pub mod diff;
pub mod enrich;
pub mod ingest;
pub mod search;

pub use diff::{DiffCalculator, DiffOutcome, DiffReport};
pub use enrich::enrich_entries;
pub use ingest::{IngestOutcome, IngestStats, fetch_entries, load_or_fetch};
pub use search::{SearchIndex, SearchItem, write_search_files};
