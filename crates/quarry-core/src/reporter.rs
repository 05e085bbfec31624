//! Reporter trait for dependency injection
//!
//! Pipeline components report user-facing progress through this trait
//! instead of printing, so the CLI owns presentation and tests can capture
//! what was reported.

use std::path::Path;
use std::sync::Mutex;

use quarry_schema::ChecksumAlgorithm;

pub trait Reporter: Send + Sync {
    /// A new phase has started (e.g. "Resolving", "Downloading").
    fn section(&self, title: &str);

    /// A mirror candidate is being probed.
    fn probing(&self, uri: &str, rank: usize);

    /// A mirror candidate answered the probe and will be used.
    fn resolved(&self, uri: &str);

    /// Updates the progress of a download.
    fn downloading(&self, uri: &str, current: u64, total: Option<u64>);

    /// A file passed checksum verification.
    fn verified(&self, file: &Path, algorithm: ChecksumAlgorithm);

    /// An archive is being unpacked into a directory.
    fn extracting(&self, archive: &Path, dest: &Path);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn probing(&self, uri: &str, rank: usize) {
        (**self).probing(uri, rank);
    }
    fn resolved(&self, uri: &str) {
        (**self).resolved(uri);
    }
    fn downloading(&self, uri: &str, current: u64, total: Option<u64>) {
        (**self).downloading(uri, current, total);
    }
    fn verified(&self, file: &Path, algorithm: ChecksumAlgorithm) {
        (**self).verified(file, algorithm);
    }
    fn extracting(&self, archive: &Path, dest: &Path) {
        (**self).extracting(archive, dest);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn probing(&self, _: &str, _: usize) {}
    fn resolved(&self, _: &str) {}
    fn downloading(&self, _: &str, _: u64, _: Option<u64>) {}
    fn verified(&self, _: &Path, _: ChecksumAlgorithm) {}
    fn extracting(&self, _: &Path, _: &Path) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}

/// One recorded call on a [`MemoryReporter`].
///
/// Download progress is not recorded; it is too chatty to assert on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterEvent {
    Section(String),
    Probing { uri: String, rank: usize },
    Resolved(String),
    Verified(ChecksumAlgorithm),
    Extracting,
    Info(String),
    Warning(String),
    Error(String),
}

/// Captures events in memory, in call order.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<ReporterEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn events(&self) -> Vec<ReporterEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Recorded warning messages.
    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReporterEvent::Warning(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ReporterEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Reporter for MemoryReporter {
    fn section(&self, title: &str) {
        self.push(ReporterEvent::Section(title.to_string()));
    }
    fn probing(&self, uri: &str, rank: usize) {
        self.push(ReporterEvent::Probing {
            uri: uri.to_string(),
            rank,
        });
    }
    fn resolved(&self, uri: &str) {
        self.push(ReporterEvent::Resolved(uri.to_string()));
    }
    fn downloading(&self, _: &str, _: u64, _: Option<u64>) {}
    fn verified(&self, _: &Path, algorithm: ChecksumAlgorithm) {
        self.push(ReporterEvent::Verified(algorithm));
    }
    fn extracting(&self, _: &Path, _: &Path) {
        self.push(ReporterEvent::Extracting);
    }
    fn info(&self, msg: &str) {
        self.push(ReporterEvent::Info(msg.to_string()));
    }
    fn warning(&self, msg: &str) {
        self.push(ReporterEvent::Warning(msg.to_string()));
    }
    fn error(&self, msg: &str) {
        self.push(ReporterEvent::Error(msg.to_string()));
    }
}
