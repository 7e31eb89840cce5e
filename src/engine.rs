//! The boundary between the tool dispatcher and a browser automation engine.
//!
//! An engine launches browsers; a browser owns contexts; a context owns
//! pages. Every handle can be closed independently so teardown can make
//! progress even when one level fails.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::session::ConsoleEntry;

pub type EngineResult<T> = Result<T, EngineError>;

/// Console messages emitted by a page, in the order the page produced them.
pub type ConsoleFeed = mpsc::UnboundedReceiver<ConsoleEntry>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Browser engine '{0}' is not supported by this server (only chromium is available)")]
    Unsupported(EngineKind),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Timeout {timeout_ms}ms exceeded while waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("{0}")]
    Operation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Chromium => "chromium",
            EngineKind::Firefox => "firefox",
            EngineKind::Webkit => "webkit",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    pub engine: EngineKind,
    pub headless: bool,
}

/// Element lifecycle states `wait_for` can block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    Attached,
    Detached,
    #[default]
    Visible,
    Hidden,
}

impl ElementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementState::Attached => "attached",
            ElementState::Detached => "detached",
            ElementState::Visible => "visible",
            ElementState::Hidden => "hidden",
        }
    }

    /// Whether an element seen as `attached`/`visible` satisfies this state.
    pub fn is_satisfied(&self, attached: bool, visible: bool) -> bool {
        match self {
            ElementState::Attached => attached,
            ElementState::Detached => !attached,
            ElementState::Visible => attached && visible,
            ElementState::Hidden => !attached || !visible,
        }
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Smooth,
}

impl ScrollBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollBehavior::Auto => "auto",
            ScrollBehavior::Smooth => "smooth",
        }
    }
}

/// Signed scroll offsets in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollDelta {
    pub x: i64,
    pub y: i64,
}

/// Document and viewport extents plus the current scroll offset, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    pub scroll_x: i64,
    pub scroll_y: i64,
    pub content_width: i64,
    pub content_height: i64,
    pub viewport_width: i64,
    pub viewport_height: i64,
}

/// A freshly opened page and the console messages it will emit.
pub struct NewPage {
    pub page: Box<dyn PageHandle>,
    pub console: ConsoleFeed,
}

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> EngineResult<Box<dyn BrowserHandle>>;
}

#[async_trait]
pub trait BrowserHandle: Send + Sync {
    /// Open an isolated context, optionally with a fixed viewport for its pages.
    async fn new_context(&mut self, viewport: Option<Viewport>) -> EngineResult<Box<dyn ContextHandle>>;
    async fn close(&mut self) -> EngineResult<()>;
}

#[async_trait]
pub trait ContextHandle: Send + Sync {
    async fn new_page(&mut self) -> EngineResult<NewPage>;
    async fn close(&mut self) -> EngineResult<()>;
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Load `url`. With `wait_for_load`, return only once the page has settled.
    async fn navigate(&self, url: &str, wait_for_load: bool) -> EngineResult<()>;
    async fn click(&self, selector: &str, timeout: Duration) -> EngineResult<()>;
    async fn fill(&self, selector: &str, text: &str, delay: Duration) -> EngineResult<()>;
    async fn screenshot(&self, full_page: bool) -> EngineResult<Vec<u8>>;
    /// JSON value of the script's result; `None` when it evaluates to `undefined`.
    async fn evaluate(&self, script: &str) -> EngineResult<Option<serde_json::Value>>;
    async fn wait_for(&self, selector: &str, state: ElementState, timeout: Duration) -> EngineResult<()>;
    /// Text content of the first match; `None` when the element has none.
    async fn text_content(&self, selector: &str, timeout: Duration) -> EngineResult<Option<String>>;
    async fn url(&self) -> EngineResult<String>;
    async fn title(&self) -> EngineResult<String>;
    async fn viewport(&self) -> EngineResult<Option<Viewport>>;
    async fn scroll_by(&self, delta: ScrollDelta, behavior: ScrollBehavior) -> EngineResult<()>;
    async fn scroll_metrics(&self) -> EngineResult<ScrollMetrics>;
    async fn close(&mut self) -> EngineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_state_satisfaction() {
        assert!(ElementState::Attached.is_satisfied(true, false));
        assert!(!ElementState::Attached.is_satisfied(false, false));
        assert!(ElementState::Detached.is_satisfied(false, false));
        assert!(ElementState::Visible.is_satisfied(true, true));
        assert!(!ElementState::Visible.is_satisfied(true, false));
        assert!(ElementState::Hidden.is_satisfied(false, false));
        assert!(ElementState::Hidden.is_satisfied(true, false));
        assert!(!ElementState::Hidden.is_satisfied(true, true));
    }

    #[test]
    fn unsupported_engine_message_names_engine() {
        let msg = EngineError::Unsupported(EngineKind::Firefox).to_string();
        assert!(msg.contains("firefox"));
    }

    #[test]
    fn engine_kind_deserializes_lowercase() {
        let kind: EngineKind = serde_json::from_str("\"webkit\"").unwrap();
        assert_eq!(kind, EngineKind::Webkit);
        assert_eq!(EngineKind::default(), EngineKind::Chromium);
    }
}
