// src/utils/report.rs

//! Reporting collaborator for pipeline progress and change notifications.
//!
//! The pipeline never talks to a notification transport. It hands messages
//! to a [`Reporter`], and the caller decides where they go.

/// Sink for progress messages and change notifications.
pub trait Reporter {
    /// Routine progress.
    fn info(&mut self, message: &str);

    /// Something odd that did not stop the cycle.
    fn warn(&mut self, message: &str);

    /// A message meant for the diary owner (diff reports, first download).
    fn notify(&mut self, message: &str);
}

/// [`Reporter`] that writes through the `log` facade.
///
/// Notifications go to the `notify` target so a log filter can route them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn info(&mut self, message: &str) {
        log::info!("{}", message);
    }

    fn warn(&mut self, message: &str) {
        log::warn!("{}", message);
    }

    fn notify(&mut self, message: &str) {
        log::info!(target: "notify", "{}", message);
    }
}

/// Log a summary section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        log::info!("    {}: {}", key, value);
    }
}
