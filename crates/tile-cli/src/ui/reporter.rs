//! Console implementation of the core `Reporter`.
//!
//! Progress goes to stderr so stdout only carries the summary table.

use super::theme::{Theme, format_size};
use crossterm::style::Stylize;
use std::io::Write;
use std::sync::Mutex;
use tile_core::Reporter;
use tile_schema::{LocatedArtifact, ReleaseId};

pub struct ConsoleReporter {
    theme: Theme,
    // Serializes writes from concurrent tasks.
    out: Mutex<std::io::Stderr>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            out: Mutex::new(std::io::stderr()),
        }
    }

    fn line(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{text}");
        }
    }

    fn release(&self, id: &ReleaseId) -> String {
        format!(
            "{} {}",
            id.name.as_str().with(self.theme.release_name),
            id.version.as_str().with(self.theme.version)
        )
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        self.line("");
        self.line(&title.with(self.theme.header).bold().to_string());
    }

    fn located(&self, source: &str, artifact: &LocatedArtifact) {
        let stemcell = artifact
            .stemcell()
            .map(|s| format!(" for {s}"))
            .unwrap_or_default();
        self.line(&format!(
            "  {}{} {}",
            self.release(artifact.id()),
            stemcell.with(self.theme.secondary),
            format!("in {source}").with(self.theme.secondary)
        ));
    }

    fn downloading(&self, artifact: &LocatedArtifact) {
        self.line(&format!(
            "  {} {}",
            self.release(artifact.id()),
            "downloading".with(self.theme.secondary)
        ));
    }

    fn done(&self, artifact: &LocatedArtifact, bytes: u64) {
        self.line(&format!(
            "  {} {} {}",
            "✓".with(self.theme.success),
            self.release(artifact.id()),
            format_size(bytes).with(self.theme.secondary)
        ));
    }

    fn failed(&self, id: &ReleaseId, reason: &str) {
        self.line(&format!(
            "  {} {} {}",
            "✗".with(self.theme.error),
            self.release(id),
            reason.with(self.theme.error)
        ));
    }

    fn info(&self, msg: &str) {
        self.line(&format!("  {msg}"));
    }

    fn warning(&self, msg: &str) {
        self.line(&format!("  {}", msg.with(self.theme.warning)));
    }
}
