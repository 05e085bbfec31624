//! Console reporter
//!
//! Renders pipeline progress on stderr so stdout stays free for the paths
//! commands print.

use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::Mutex;

use crossterm::style::Stylize;
use crossterm::{cursor, execute, terminal};
use quarry_core::Reporter;
use quarry_schema::ChecksumAlgorithm;

#[derive(Debug)]
pub struct ConsoleReporter {
    quiet: bool,
    interactive: bool,
    /// Last rendered download percentage, to redraw only on change.
    progress: Mutex<Option<u64>>,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            interactive: std::io::stderr().is_terminal(),
            progress: Mutex::new(None),
        }
    }

    /// Print a success message.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            self.finish_progress();
            eprintln!("{} {msg}", "✓".green());
        }
    }

    fn line(&self, prefix: impl std::fmt::Display, msg: &str) {
        if self.quiet {
            return;
        }
        self.finish_progress();
        eprintln!("{prefix} {msg}");
    }

    /// End an in-place progress line before printing anything else.
    fn finish_progress(&self) {
        if let Ok(mut last) = self.progress.lock() {
            if last.take().is_some() && self.interactive {
                eprintln!();
            }
        }
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        self.line("::".dark_grey(), &title.bold().to_string());
    }

    fn probing(&self, uri: &str, rank: usize) {
        tracing::debug!(%uri, rank, "probing mirror");
    }

    fn resolved(&self, uri: &str) {
        self.line("  mirror".dark_grey(), uri);
    }

    fn downloading(&self, uri: &str, current: u64, total: Option<u64>) {
        if self.quiet || !self.interactive {
            return;
        }
        let Some(total) = total.filter(|t| *t > 0) else {
            return;
        };
        let percent = current.saturating_mul(100) / total;

        let Ok(mut last) = self.progress.lock() else {
            return;
        };
        if *last == Some(percent) {
            return;
        }
        *last = Some(percent);

        let mut err = std::io::stderr();
        let _ = execute!(
            err,
            cursor::MoveToColumn(0),
            terminal::Clear(terminal::ClearType::CurrentLine)
        );
        let _ = write!(
            err,
            "  {} {} {:>3}% {}",
            "download".dark_grey(),
            quarry_core::filename_from_url(uri),
            percent,
            format!("({} / {} KiB)", current / 1024, total / 1024).dark_grey()
        );
        let _ = err.flush();
    }

    fn verified(&self, file: &Path, algorithm: ChecksumAlgorithm) {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.line("  verified".dark_grey(), &format!("{name} ({algorithm})"));
    }

    fn extracting(&self, archive: &Path, dest: &Path) {
        self.line(
            "  extract".dark_grey(),
            &format!("{} → {}", archive.display(), dest.display()),
        );
    }

    fn info(&self, msg: &str) {
        self.line("  ".to_string(), msg);
    }

    fn warning(&self, msg: &str) {
        self.line("warning:".yellow(), msg);
    }

    fn error(&self, msg: &str) {
        self.finish_progress();
        eprintln!("{} {msg}", "error:".red());
    }
}
