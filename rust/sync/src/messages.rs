// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! User-facing error and warning log.
//!
//! Entries accumulate during reconciliation and are shown to the user through
//! the host in one message.

use crate::host::Host;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One user-facing message.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
}

/// Accumulated errors and warnings for the open document.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Vec<LogEntry>,
    unviewed: bool,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.entries.push(LogEntry { severity, message });
        self.unviewed = true;
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn errors(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.severity == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Returns `true` if entries were added since the last [`ErrorLog::show`].
    pub fn unviewed(&self) -> bool {
        self.unviewed
    }

    /// Shows all entries through the host's message surface. Does nothing if
    /// the user has already seen them.
    pub fn show<H: Host>(&mut self, host: &mut H) {
        if !self.unviewed {
            return;
        }
        let text = self
            .entries
            .iter()
            .map(|e| match e.severity {
                Severity::Error => format!("Error: {}", e.message),
                Severity::Warning => format!("Warning: {}", e.message),
            })
            .collect::<Vec<_>>()
            .join("\n");
        host.show_message(&text);
        self.unviewed = false;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.unviewed = false;
    }
}
