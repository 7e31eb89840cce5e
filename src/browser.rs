//! Chrome DevTools Protocol implementation of the engine boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams};
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, RemoteObject};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::{
    BrowserEngine, BrowserHandle, ContextHandle, ElementState, EngineError, EngineKind,
    EngineResult, LaunchOptions, NewPage, PageHandle, ScrollBehavior, ScrollDelta, ScrollMetrics,
    Viewport,
};
use crate::scripts::{self, ElementStatus};
use crate::session::{ConsoleEntry, ConsoleLevel};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const FILL_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;

impl From<CdpError> for EngineError {
    fn from(e: CdpError) -> Self {
        EngineError::Operation(e.to_string())
    }
}

/// Launches local Chrome/Chromium processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct CdpEngine;

#[async_trait]
impl BrowserEngine for CdpEngine {
    async fn launch(&self, options: &LaunchOptions) -> EngineResult<Box<dyn BrowserHandle>> {
        if options.engine != EngineKind::Chromium {
            return Err(EngineError::Unsupported(options.engine));
        }

        info!(headless = options.headless, "launching Chrome");
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .viewport(CdpViewport {
                width: DEFAULT_VIEWPORT_WIDTH,
                height: DEFAULT_VIEWPORT_HEIGHT,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            });
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| EngineError::Launch(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            EngineError::Launch(format!("{e}. Is Chrome/Chromium installed?"))
        })?;

        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        info!("Chrome launched");
        Ok(Box::new(CdpBrowser {
            browser: Arc::new(Mutex::new(browser)),
            handler_task,
        }))
    }
}

struct CdpBrowser {
    browser: Arc<Mutex<Browser>>,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserHandle for CdpBrowser {
    async fn new_context(&mut self, viewport: Option<Viewport>) -> EngineResult<Box<dyn ContextHandle>> {
        let id = self
            .browser
            .lock()
            .await
            .create_browser_context(CreateBrowserContextParams::default())
            .await?;
        debug!(context = ?id, "browser context created");
        Ok(Box::new(CdpContext {
            browser: Arc::clone(&self.browser),
            id,
            viewport,
        }))
    }

    async fn close(&mut self) -> EngineResult<()> {
        let result = self.browser.lock().await.close().await;
        self.handler_task.abort();
        result?;
        info!("Chrome closed");
        Ok(())
    }
}

struct CdpContext {
    browser: Arc<Mutex<Browser>>,
    id: BrowserContextId,
    viewport: Option<Viewport>,
}

#[async_trait]
impl ContextHandle for CdpContext {
    async fn new_page(&mut self) -> EngineResult<NewPage> {
        let mut params = CreateTargetParams::new("about:blank");
        params.browser_context_id = Some(self.id.clone());
        let page = self.browser.lock().await.new_page(params).await?;

        if let Some(viewport) = self.viewport {
            let metrics = SetDeviceMetricsOverrideParams::builder()
                .width(i64::from(viewport.width))
                .height(i64::from(viewport.height))
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(|e| EngineError::Operation(format!("invalid viewport: {e}")))?;
            page.execute(metrics).await?;
        }

        let (tx, console) = mpsc::unbounded_channel();
        let console_task = spawn_console_forwarder(&page, tx).await?;

        Ok(NewPage {
            page: Box::new(CdpPage { page, console_task }),
            console,
        })
    }

    async fn close(&mut self) -> EngineResult<()> {
        self.browser
            .lock()
            .await
            .dispose_browser_context(self.id.clone())
            .await?;
        Ok(())
    }
}

async fn spawn_console_forwarder(
    page: &Page,
    tx: mpsc::UnboundedSender<ConsoleEntry>,
) -> EngineResult<JoinHandle<()>> {
    let mut events = page.event_listener::<EventConsoleApiCalled>().await?;
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let level = ConsoleLevel::from_console_type(&format!("{:?}", event.r#type));
            let message = event
                .args
                .iter()
                .map(console_arg_text)
                .collect::<Vec<_>>()
                .join(" ");
            debug!(level = %level, message = %message, "console event captured");
            if tx.send(ConsoleEntry::new(level, message)).is_err() {
                break;
            }
        }
    }))
}

fn console_arg_text(arg: &RemoteObject) -> String {
    if let Some(value) = &arg.value {
        return match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    if let Some(desc) = &arg.description {
        return desc.clone();
    }
    if let Some(unser) = &arg.unserializable_value {
        return unser.inner().clone();
    }
    String::from("[unknown]")
}

struct CdpPage {
    page: Page,
    console_task: JoinHandle<()>,
}

impl CdpPage {
    async fn element_status(&self, selector: &str) -> EngineResult<ElementStatus> {
        let js = scripts::build_element_status_js(selector);
        let json = self
            .page
            .evaluate(js.as_str())
            .await?
            .into_value::<String>()
            .unwrap_or_default();
        Ok(ElementStatus::from_json(&json))
    }

    /// Re-check `selector` until `done` accepts it or `timeout` elapses.
    async fn poll_element(
        &self,
        selector: &str,
        timeout: Duration,
        waiting_for: &str,
        done: impl Fn(&ElementStatus) -> bool + Send + Sync,
    ) -> EngineResult<ElementStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.element_status(selector).await?;
            if done(&status) {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout {
                    what: format!("selector \"{selector}\" to be {waiting_for}"),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn find_within(&self, selector: &str, timeout: Duration) -> EngineResult<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) if Instant::now() >= deadline => {
                    debug!(selector = %selector, error = %e, "element lookup gave up");
                    return Err(EngineError::Timeout {
                        what: format!("selector \"{selector}\""),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                Err(_) => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    async fn evaluate_string(&self, js: &str) -> EngineResult<String> {
        Ok(self
            .page
            .evaluate(js)
            .await?
            .into_value::<String>()
            .unwrap_or_default())
    }
}

#[async_trait]
impl PageHandle for CdpPage {
    async fn navigate(&self, url: &str, wait_for_load: bool) -> EngineResult<()> {
        debug!(url = %url, wait_for_load = wait_for_load, "navigate");
        if wait_for_load {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
        } else {
            let response = self.page.execute(NavigateParams::new(url)).await?;
            if let Some(error) = &response.result.error_text {
                return Err(EngineError::Operation(format!("navigation to {url} failed: {error}")));
            }
        }
        Ok(())
    }

    async fn click(&self, selector: &str, timeout: Duration) -> EngineResult<()> {
        let element = self.find_within(selector, timeout).await?;
        element.click().await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str, delay: Duration) -> EngineResult<()> {
        // The value is set in one step; a per-keystroke delay does not apply.
        debug!(selector = %selector, delay_ms = delay.as_millis() as u64, "fill");
        self.poll_element(selector, FILL_TIMEOUT, "attached", |p| p.attached)
            .await?;
        let result = self.evaluate_string(&scripts::build_fill_js(selector, text)).await?;
        if result == "NOT_FOUND" {
            warn!(selector = %selector, "element vanished before fill");
            return Err(EngineError::Operation(format!(
                "Element {selector} not found in the live DOM"
            )));
        }
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> EngineResult<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        Ok(self.page.screenshot(params).await?)
    }

    async fn evaluate(&self, script: &str) -> EngineResult<Option<serde_json::Value>> {
        let result = self.page.evaluate(script).await?;
        // `undefined` comes back as a remote object without a value.
        Ok(result.value().cloned())
    }

    async fn wait_for(&self, selector: &str, state: ElementState, timeout: Duration) -> EngineResult<()> {
        self.poll_element(selector, timeout, state.as_str(), |p| {
            state.is_satisfied(p.attached, p.visible)
        })
        .await?;
        Ok(())
    }

    async fn text_content(&self, selector: &str, timeout: Duration) -> EngineResult<Option<String>> {
        let status = self
            .poll_element(selector, timeout, "attached", |p| p.attached)
            .await?;
        Ok(status.text)
    }

    async fn url(&self) -> EngineResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> EngineResult<String> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn viewport(&self) -> EngineResult<Option<Viewport>> {
        let json = self.evaluate_string(scripts::VIEWPORT_JS).await?;
        Ok(scripts::parse_viewport_json(&json))
    }

    async fn scroll_by(&self, delta: ScrollDelta, behavior: ScrollBehavior) -> EngineResult<()> {
        self.evaluate_string(&scripts::build_scroll_js(delta, behavior))
            .await?;
        Ok(())
    }

    async fn scroll_metrics(&self) -> EngineResult<ScrollMetrics> {
        let json = self.evaluate_string(scripts::SCROLL_METRICS_JS).await?;
        scripts::parse_scroll_metrics_json(&json)
            .ok_or_else(|| EngineError::Operation(format!("unexpected scroll metrics reply: {json}")))
    }

    async fn close(&mut self) -> EngineResult<()> {
        self.console_task.abort();
        self.page.clone().close().await?;
        Ok(())
    }
}
