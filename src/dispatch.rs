//! Routes validated tool calls to the browser session and turns every
//! outcome into a [`ResponseEnvelope`].

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::args::{
    self, AnalyzeScreenshotArgs, CheckScrollabilityArgs, ClickElementArgs, EvaluateJavascriptArgs,
    GetConsoleLogsArgs, GetElementTextArgs, LaunchBrowserArgs, NavigateArgs, ScreenshotArgs,
    ScrollArgs, ToolCall, TypeTextArgs, WaitForElementArgs,
};
use crate::describe::{self, ImageDescriber};
use crate::engine::{BrowserEngine, LaunchOptions, NewPage, PageHandle};
use crate::envelope::ResponseEnvelope;
use crate::error::ToolError;
use crate::scroll::Scrollability;
use crate::session::{ActiveSession, Session};

/// Owns the browser session and executes tool calls against it, one at a time.
pub struct Dispatcher {
    engine: Box<dyn BrowserEngine>,
    describer: Box<dyn ImageDescriber>,
    session: Session,
}

impl Dispatcher {
    pub fn new(engine: impl BrowserEngine + 'static, describer: impl ImageDescriber + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            describer: Box::new(describer),
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run `name` with `arguments`. Always yields an envelope; failures are
    /// reported through `is_error`.
    pub async fn dispatch(&mut self, name: &str, arguments: Option<&Value>) -> ResponseEnvelope {
        info!(tool = %name, "dispatch");
        debug!(tool = %name, arguments = ?arguments, "raw arguments");

        let result = match ToolCall::parse(name, arguments) {
            Ok(call) => self.run(call).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!(tool = %name, error = %e, "tool call failed");
        }
        ResponseEnvelope::from(result)
    }

    /// Close whatever is open. Used on process shutdown.
    pub async fn shutdown(&mut self) {
        if self.session.teardown().await {
            info!("browser session closed on shutdown");
        }
    }

    async fn run(&mut self, call: ToolCall) -> Result<String, ToolError> {
        if call.requires_page() && !self.session.has_active_page() {
            return Err(ToolError::NoActivePage);
        }
        debug!(tool = call.name(), "running");

        match call {
            ToolCall::LaunchBrowser(args) => self.launch_browser(args).await,
            ToolCall::Navigate(args) => self.navigate(args).await,
            ToolCall::ClickElement(args) => self.click_element(args).await,
            ToolCall::TypeText(args) => self.type_text(args).await,
            ToolCall::Screenshot(args) => self.screenshot(args).await,
            ToolCall::GetElementText(args) => self.get_element_text(args).await,
            ToolCall::WaitForElement(args) => self.wait_for_element(args).await,
            ToolCall::EvaluateJavascript(args) => self.evaluate_javascript(args).await,
            ToolCall::GetConsoleLogs(args) => self.get_console_logs(args),
            ToolCall::GetPageInfo => self.get_page_info().await,
            ToolCall::CloseBrowser => self.close_browser().await,
            ToolCall::AnalyzeScreenshot(args) => self.analyze_screenshot(args).await,
            ToolCall::Scroll(args) => self.scroll(args).await,
            ToolCall::CheckScrollability(args) => self.check_scrollability(args).await,
        }
    }

    fn page(&self) -> Result<&dyn PageHandle, ToolError> {
        self.session.page().ok_or(ToolError::NoActivePage)
    }

    async fn launch_browser(&mut self, args: LaunchBrowserArgs) -> Result<String, ToolError> {
        if self.session.teardown().await {
            info!("closed previous browser before relaunch");
        }

        let options = LaunchOptions {
            engine: args.browser,
            headless: args.headless,
        };
        info!(engine = %options.engine, headless = options.headless, "launch_browser");

        let mut browser = self.engine.launch(&options).await?;

        let viewport = args.viewport.as_ref().map(|v| v.to_viewport());
        let mut context = match browser.new_context(viewport).await {
            Ok(context) => context,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!(error = %close_err, "failed to close browser after context error");
                }
                return Err(e.into());
            }
        };

        let NewPage { page, console } = match context.new_page().await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = context.close().await {
                    warn!(error = %close_err, "failed to close context after page error");
                }
                if let Err(close_err) = browser.close().await {
                    warn!(error = %close_err, "failed to close browser after page error");
                }
                return Err(e.into());
            }
        };

        self.session
            .replace_session(ActiveSession { browser, context, page }, console)
            .await;

        let mode = if options.headless { "(headless)" } else { "(headed)" };
        Ok(format!("Browser {} launched successfully {mode}", options.engine))
    }

    async fn navigate(&mut self, args: NavigateArgs) -> Result<String, ToolError> {
        info!(url = %args.url, wait_for_load = args.wait_for_load, "navigate");
        let page = self.page()?;
        page.navigate(&args.url, args.wait_for_load).await?;
        let title = page.title().await?;
        Ok(format!("Navigated to {}\nPage title: {title}", args.url))
    }

    async fn click_element(&mut self, args: ClickElementArgs) -> Result<String, ToolError> {
        info!(selector = %args.selector, "click_element");
        self.page()?
            .click(&args.selector, args::millis(args.timeout))
            .await?;
        Ok(format!("Clicked element: {}", args.selector))
    }

    async fn type_text(&mut self, args: TypeTextArgs) -> Result<String, ToolError> {
        info!(selector = %args.selector, chars = args.text.chars().count(), "type_text");
        self.page()?
            .fill(&args.selector, &args.text, args::millis(args.delay))
            .await?;
        Ok(format!("Typed \"{}\" into element: {}", args.text, args.selector))
    }

    async fn screenshot(&mut self, args: ScreenshotArgs) -> Result<String, ToolError> {
        let bytes = self.page()?.screenshot(args.full_page).await?;
        match args.path {
            Some(path) => {
                let path = PathBuf::from(path);
                persist(&path, &bytes).await?;
                Ok(format!("Screenshot saved to: {}", path.display()))
            }
            None => Ok(format!("Screenshot captured ({} bytes)", bytes.len())),
        }
    }

    async fn get_element_text(&mut self, args: GetElementTextArgs) -> Result<String, ToolError> {
        let text = self
            .page()?
            .text_content(&args.selector, args::millis(args.timeout))
            .await?;
        let text = text.filter(|t| !t.is_empty());
        Ok(format!("Element text: {}", text.as_deref().unwrap_or("(empty)")))
    }

    async fn wait_for_element(&mut self, args: WaitForElementArgs) -> Result<String, ToolError> {
        info!(selector = %args.selector, state = %args.state, "wait_for_element");
        self.page()?
            .wait_for(&args.selector, args.state, args::millis(args.timeout))
            .await?;
        Ok(format!("Element {} is now {}", args.selector, args.state))
    }

    async fn evaluate_javascript(&mut self, args: EvaluateJavascriptArgs) -> Result<String, ToolError> {
        let value = self.page()?.evaluate(&args.script).await?;
        Ok(format!("JavaScript result: {}", render_js_value(value.as_ref())))
    }

    fn get_console_logs(&mut self, args: GetConsoleLogsArgs) -> Result<String, ToolError> {
        let entries = self.session.drain_console_entries(args.level, args.clear);
        debug!(count = entries.len(), cleared = args.clear, "get_console_logs");
        if entries.is_empty() {
            return Ok("(no console logs)".into());
        }
        Ok(entries
            .iter()
            .map(|e| e.to_line())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn get_page_info(&mut self) -> Result<String, ToolError> {
        let page = self.page()?;
        let title = page.title().await?;
        let url = page.url().await?;
        let viewport = match page.viewport().await? {
            Some(v) => format!("{}x{}", v.width, v.height),
            None => "unknown".into(),
        };
        Ok(format!("Page Info:\nTitle: {title}\nURL: {url}\nViewport: {viewport}"))
    }

    async fn close_browser(&mut self) -> Result<String, ToolError> {
        if self.session.teardown().await {
            Ok("Browser closed successfully".into())
        } else {
            Ok("No browser instance to close".into())
        }
    }

    async fn analyze_screenshot(&mut self, args: AnalyzeScreenshotArgs) -> Result<String, ToolError> {
        let path = args
            .path
            .map(PathBuf::from)
            .unwrap_or_else(timestamped_screenshot_path);

        let bytes = self.page()?.screenshot(args.full_page).await?;
        persist(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), model = %args.model, "analyze_screenshot");

        let prompt = describe::build_prompt(args.detailed, args.pretext.as_deref());
        match self.describer.describe(&bytes, &prompt, &args.model).await {
            Ok(description) => Ok(format!(
                "AI Analysis (model: {}):\n{description}\n\nScreenshot saved to: {}",
                args.model,
                path.display()
            )),
            Err(e) => {
                warn!(error = %e, "screenshot description failed");
                Ok(format!(
                    "Screenshot saved to: {}\nAI analysis unavailable: {e}\n\
                     Make sure the image description service is running and the model '{}' is installed.",
                    path.display(),
                    args.model
                ))
            }
        }
    }

    async fn scroll(&mut self, args: ScrollArgs) -> Result<String, ToolError> {
        let pixels = args::scroll_pixels(args.pixels);
        let delta = args.direction.delta(pixels);
        debug!(dx = delta.x, dy = delta.y, behavior = args.behavior.as_str(), "scroll");
        self.page()?.scroll_by(delta, args.behavior).await?;
        Ok(format!(
            "Scrolled {} by {pixels} pixels ({} behavior)",
            args.direction.as_str(),
            args.behavior.as_str()
        ))
    }

    async fn check_scrollability(&mut self, args: CheckScrollabilityArgs) -> Result<String, ToolError> {
        let metrics = self.page()?.scroll_metrics().await?;
        Ok(Scrollability::from_metrics(&metrics).render(args.direction))
    }
}

async fn persist(path: &Path, bytes: &[u8]) -> Result<(), ToolError> {
    let to_error = |source| ToolError::Persist {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(to_error)?;
    }
    tokio::fs::write(path, bytes).await.map_err(to_error)
}

/// Pretty JSON, or `undefined` when the script produced no value.
fn render_js_value(value: Option<&Value>) -> String {
    match value {
        Some(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".into()),
        None => "undefined".into(),
    }
}

fn timestamped_screenshot_path() -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    PathBuf::from(format!("screenshot-{millis}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_named_screenshots_are_png_in_cwd() {
        let path = timestamped_screenshot_path();
        let name = path.to_str().unwrap();
        assert!(name.starts_with("screenshot-"));
        assert!(name.ends_with(".png"));
        assert!(path.parent().map_or(true, |p| p.as_os_str().is_empty()));
    }

    #[test]
    fn js_values_render_like_json_stringify() {
        assert_eq!(render_js_value(None), "undefined");
        assert_eq!(render_js_value(Some(&Value::Null)), "null");
        assert_eq!(render_js_value(Some(&serde_json::json!([1, 2]))), "[\n  1,\n  2\n]");
    }

    #[tokio::test]
    async fn persist_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/shot.png");
        persist(&path, b"png").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
    }
}
