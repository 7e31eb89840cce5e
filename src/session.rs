use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{BrowserHandle, ConsoleFeed, ContextHandle, PageHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    /// Map a browser console API call type (e.g. `warning`, `assert`) to a level.
    pub fn from_console_type(kind: &str) -> Self {
        match kind.to_ascii_lowercase().as_str() {
            "info" => ConsoleLevel::Info,
            "warn" | "warning" => ConsoleLevel::Warn,
            "error" | "assert" => ConsoleLevel::Error,
            "debug" => ConsoleLevel::Debug,
            _ => ConsoleLevel::Log,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleEntry {
    pub level: ConsoleLevel,
    pub message: String,
    pub captured_at: DateTime<Utc>,
}

impl ConsoleEntry {
    pub fn new(level: ConsoleLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            captured_at: Utc::now(),
        }
    }

    /// `[timestamp] LEVEL: message`
    pub fn to_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level.as_str().to_uppercase(),
            self.message
        )
    }
}

/// The browser, context and page that make up a live session.
///
/// They only ever exist together, so a page can never outlive its context or
/// browser.
pub struct ActiveSession {
    pub browser: Box<dyn BrowserHandle>,
    pub context: Box<dyn ContextHandle>,
    pub page: Box<dyn PageHandle>,
}

/// Mutable state shared by consecutive tool calls: at most one active
/// browser session and the console messages captured from its page.
#[derive(Default)]
pub struct Session {
    active: Option<ActiveSession>,
    console_log: Vec<ConsoleEntry>,
    console_feed: Option<ConsoleFeed>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_active_page(&self) -> bool {
        self.active.is_some()
    }

    pub fn page(&self) -> Option<&dyn PageHandle> {
        self.active.as_ref().map(|a| a.page.as_ref())
    }

    /// Close any previous session, then install `active` with an empty console log.
    pub async fn replace_session(&mut self, active: ActiveSession, console: ConsoleFeed) {
        if self.teardown().await {
            debug!("previous session closed before replacement");
        }
        self.active = Some(active);
        self.console_feed = Some(console);
        self.console_log.clear();
    }

    /// Close page, context and browser in that order. Each close is attempted
    /// even if an earlier one failed. Returns whether a session was active.
    pub async fn teardown(&mut self) -> bool {
        self.console_feed = None;
        self.console_log.clear();

        let Some(mut active) = self.active.take() else {
            return false;
        };

        if let Err(e) = active.page.close().await {
            warn!(error = %e, "failed to close page");
        }
        if let Err(e) = active.context.close().await {
            warn!(error = %e, "failed to close browser context");
        }
        if let Err(e) = active.browser.close().await {
            warn!(error = %e, "failed to close browser");
        }

        info!("browser session torn down");
        true
    }

    pub fn append_console_entry(&mut self, entry: ConsoleEntry) {
        self.console_log.push(entry);
    }

    /// Read buffered console entries, optionally only those at `level`.
    ///
    /// With `clear_after`, the whole buffer is emptied after the read, not just
    /// the entries the filter selected.
    pub fn drain_console_entries(
        &mut self,
        level: Option<ConsoleLevel>,
        clear_after: bool,
    ) -> Vec<ConsoleEntry> {
        self.pump_console_feed();

        let entries: Vec<ConsoleEntry> = match level {
            Some(level) => self
                .console_log
                .iter()
                .filter(|e| e.level == level)
                .cloned()
                .collect(),
            None => self.console_log.clone(),
        };

        if clear_after {
            self.console_log.clear();
        }
        entries
    }

    fn pump_console_feed(&mut self) {
        let Some(feed) = self.console_feed.as_mut() else {
            return;
        };
        while let Ok(entry) = feed.try_recv() {
            self.console_log.push(entry);
        }
    }
}
