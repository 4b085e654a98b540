//! Diff calculation for change notifications.
//!
//! Compares the previous and current snapshots by date and topic title and
//! produces a line-oriented report for the diary owner.

use std::collections::HashMap;
use std::fmt;

use similar::{ChangeTag, TextDiff};

use crate::models::DiaryEntry;
use crate::utils::report::Reporter;

/// Notice sent when there is no previous snapshot to compare against.
pub const FIRST_DOWNLOAD_NOTICE: &str = "Diary downloaded for the first time";

/// Warning emitted when either snapshot is empty.
pub const EMPTY_SNAPSHOT_WARNING: &str = "Skipping diff: one of the snapshots is empty";

/// One change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEntry {
    DateRemoved { date: String },
    TopicRemoved { date: String, title: String },
    DateAdded { date: String },
    TopicAdded { date: String, title: String },
    TopicChanged {
        date: String,
        title: String,
        /// Unified diff of the topic's content and hashtag lines
        body: String,
    },
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateRemoved { date } => write!(f, "del: {date}"),
            Self::TopicRemoved { date, title } => write!(f, "del: {date} -> {title}"),
            Self::DateAdded { date } => write!(f, "add: {date}"),
            Self::TopicAdded { date, title } => write!(f, "add: {date} -> {title}"),
            Self::TopicChanged { date, title, body } => {
                write!(f, "changed: {date} -> {title}\n```diff\n{body}\n```")
            }
        }
    }
}

/// Ordered list of changes: deletions first, then additions and changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    pub entries: Vec<DiffEntry>,
}

impl DiffReport {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.entries.len()
    }

    /// Render the report as notification text, one change per line.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Result of comparing two persisted snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// No previous snapshot existed
    FirstDownload,
    /// One side is empty, so no meaningful diff exists
    EmptySnapshot,
    Changes(DiffReport),
}

/// Titles and their lines for one date, in first-seen order.
type TopicLines<'a> = Vec<(&'a str, Vec<String>)>;

/// Calculator for computing diffs between snapshots.
#[derive(Debug, Clone)]
pub struct DiffCalculator {
    /// Unchanged lines shown around each hunk
    context_lines: usize,
}

impl Default for DiffCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffCalculator {
    /// Create a new diff calculator.
    pub fn new() -> Self {
        Self { context_lines: 3 }
    }

    /// Create a diff calculator with a custom hunk context size.
    pub fn with_context(context_lines: usize) -> Self {
        Self { context_lines }
    }

    /// Calculate the diff between previous and current snapshots.
    pub fn calculate(&self, previous: &[DiaryEntry], current: &[DiaryEntry]) -> DiffReport {
        let old = by_date(previous);
        let new = by_date(current);
        let mut entries = Vec::new();

        for (date, topics) in &old {
            let Some(current_topics) = lookup(&new, date) else {
                entries.push(DiffEntry::DateRemoved {
                    date: date.to_string(),
                });
                continue;
            };
            for (title, _) in topics {
                if lookup(current_topics, title).is_none() {
                    entries.push(DiffEntry::TopicRemoved {
                        date: date.to_string(),
                        title: title.to_string(),
                    });
                }
            }
        }

        for (date, topics) in &new {
            let Some(previous_topics) = lookup(&old, date) else {
                entries.push(DiffEntry::DateAdded {
                    date: date.to_string(),
                });
                continue;
            };
            for (title, lines) in topics {
                match lookup(previous_topics, title) {
                    None => entries.push(DiffEntry::TopicAdded {
                        date: date.to_string(),
                        title: title.to_string(),
                    }),
                    Some(old_lines) => {
                        if let Some(body) = self.unified(old_lines, lines) {
                            entries.push(DiffEntry::TopicChanged {
                                date: date.to_string(),
                                title: title.to_string(),
                                body,
                            });
                        }
                    }
                }
            }
        }

        DiffReport { entries }
    }

    /// Unified diff of two line lists, or `None` when they are equal.
    fn unified(&self, old: &[String], new: &[String]) -> Option<String> {
        if old == new {
            return None;
        }
        let old: Vec<&str> = old.iter().map(String::as_str).collect();
        let new: Vec<&str> = new.iter().map(String::as_str).collect();
        let diff = TextDiff::from_slices(&old, &new);

        let mut lines = vec!["--- previous".to_string(), "+++ current".to_string()];
        let mut unified = diff.unified_diff();
        unified.context_radius(self.context_lines);
        for hunk in unified.iter_hunks() {
            lines.push(hunk.header().to_string());
            for change in hunk.iter_changes() {
                let sign = match change.tag() {
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                    ChangeTag::Equal => ' ',
                };
                lines.push(format!("{sign}{}", change.value()));
            }
        }
        Some(lines.join("\n"))
    }
}

/// Group entries by date, and topics by title. A repeated key replaces the
/// earlier value but keeps its position.
fn by_date(entries: &[DiaryEntry]) -> Vec<(&str, TopicLines<'_>)> {
    let mut dates: Vec<(&str, TopicLines<'_>)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        let mut topics: TopicLines<'_> = Vec::new();
        for topic in &entry.topics {
            let lines = topic.diff_lines();
            match topics.iter_mut().find(|(title, _)| *title == topic.title) {
                Some(slot) => slot.1 = lines,
                None => topics.push((topic.title.as_str(), lines)),
            }
        }

        match positions.get(entry.date.as_str()) {
            Some(&i) => dates[i].1 = topics,
            None => {
                positions.insert(entry.date.as_str(), dates.len());
                dates.push((entry.date.as_str(), topics));
            }
        }
    }
    dates
}

fn lookup<'a, T>(list: &'a [(&str, T)], key: &str) -> Option<&'a T> {
    list.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
}

/// Compare persisted snapshots.
///
/// `previous` is `None` when no earlier snapshot was stored.
pub fn diff_snapshots(previous: Option<&[DiaryEntry]>, current: &[DiaryEntry]) -> DiffOutcome {
    let Some(previous) = previous else {
        return DiffOutcome::FirstDownload;
    };
    if previous.is_empty() || current.is_empty() {
        return DiffOutcome::EmptySnapshot;
    }
    DiffOutcome::Changes(DiffCalculator::new().calculate(previous, current))
}

/// Deliver a diff outcome to the reporter.
pub fn report_outcome(outcome: &DiffOutcome, reporter: &mut dyn Reporter) {
    match outcome {
        DiffOutcome::FirstDownload => reporter.notify(FIRST_DOWNLOAD_NOTICE),
        DiffOutcome::EmptySnapshot => reporter.warn(EMPTY_SNAPSHOT_WARNING),
        DiffOutcome::Changes(report) if report.has_changes() => {
            reporter.notify(&format!("\n{}", report.render()));
        }
        DiffOutcome::Changes(_) => reporter.info("No changes since the previous snapshot"),
    }
}
