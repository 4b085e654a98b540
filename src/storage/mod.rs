//! Storage abstractions for diary snapshots.
//!
//! The current snapshot is rotated to a previous copy before each write so
//! that the next cycle can be diffed against it.
//!
//! ## Directory Structure
//!
//! ```text
//! cache/
//! ├── diary_data.json        # Current normalized snapshot
//! ├── diary_data_prev.json   # Snapshot before the last write
//! ├── ogp.json               # Open Graph cache (link cards)
//! └── twitter.json           # oEmbed cache (social embeds)
//! ```

pub mod local;

use crate::error::Result;
use crate::models::DiaryEntry;

// Re-export for convenience
pub use local::{LocalStorage, read_json_file, write_json_file};

/// Snapshot file name.
pub const SNAPSHOT_KEY: &str = "diary_data.json";

/// Previous snapshot file name.
pub const PREVIOUS_SNAPSHOT_KEY: &str = "diary_data_prev.json";

/// Trait for snapshot storage backends.
pub trait SnapshotStorage {
    /// Load the current snapshot, `None` if none was stored yet.
    fn load_snapshot(&self) -> Result<Option<Vec<DiaryEntry>>>;

    /// Load the snapshot that was current before the last write.
    fn load_previous(&self) -> Result<Option<Vec<DiaryEntry>>>;

    /// Copy the current snapshot over the previous one.
    ///
    /// Returns `false` when there was no current snapshot to copy.
    fn rotate_snapshot(&self) -> Result<bool>;

    /// Replace the current snapshot.
    fn store_snapshot(&self, entries: &[DiaryEntry]) -> Result<()>;
}
