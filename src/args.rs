//! Typed argument records, one per tool.
//!
//! Raw arguments are first checked and defaulted by the registry in
//! [`crate::schema`]; the normalized object is then decoded into the
//! matching [`ToolCall`] variant.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::engine::{ElementState, EngineKind, ScrollBehavior, Viewport};
use crate::error::ToolError;
use crate::schema;
use crate::scroll::{ScrollAxis, ScrollDirection};
use crate::session::ConsoleLevel;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewportArgs {
    pub width: f64,
    pub height: f64,
}

impl ViewportArgs {
    pub fn to_viewport(&self) -> Viewport {
        Viewport {
            width: self.width.max(1.0).round() as u32,
            height: self.height.max(1.0).round() as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LaunchBrowserArgs {
    pub browser: EngineKind,
    pub headless: bool,
    #[serde(default)]
    pub viewport: Option<ViewportArgs>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateArgs {
    pub url: String,
    pub wait_for_load: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClickElementArgs {
    pub selector: String,
    pub timeout: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypeTextArgs {
    pub selector: String,
    pub text: String,
    pub delay: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotArgs {
    pub full_page: bool,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetElementTextArgs {
    pub selector: String,
    pub timeout: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WaitForElementArgs {
    pub selector: String,
    pub timeout: f64,
    pub state: ElementState,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluateJavascriptArgs {
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetConsoleLogsArgs {
    #[serde(default)]
    pub level: Option<ConsoleLevel>,
    pub clear: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeScreenshotArgs {
    pub full_page: bool,
    #[serde(default)]
    pub path: Option<String>,
    pub detailed: bool,
    #[serde(default)]
    pub pretext: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScrollArgs {
    pub direction: ScrollDirection,
    pub pixels: f64,
    pub behavior: ScrollBehavior,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckScrollabilityArgs {
    pub direction: ScrollAxis,
}

/// A validated request for one tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    LaunchBrowser(LaunchBrowserArgs),
    Navigate(NavigateArgs),
    ClickElement(ClickElementArgs),
    TypeText(TypeTextArgs),
    Screenshot(ScreenshotArgs),
    GetElementText(GetElementTextArgs),
    WaitForElement(WaitForElementArgs),
    EvaluateJavascript(EvaluateJavascriptArgs),
    GetConsoleLogs(GetConsoleLogsArgs),
    GetPageInfo,
    CloseBrowser,
    AnalyzeScreenshot(AnalyzeScreenshotArgs),
    Scroll(ScrollArgs),
    CheckScrollability(CheckScrollabilityArgs),
}

impl ToolCall {
    /// Look up `name` in the registry, validate `raw` against it and decode
    /// the result.
    pub fn parse(name: &str, raw: Option<&Value>) -> Result<Self, ToolError> {
        let def = schema::get_schema(name)?;
        let args = def.validate(raw)?;

        let call = match def.name {
            "launch_browser" => ToolCall::LaunchBrowser(decode(args)?),
            "navigate" => {
                let args: NavigateArgs = decode(args)?;
                url::Url::parse(&args.url)
                    .map_err(|e| ToolError::invalid("url", format!("invalid URL '{}': {e}", args.url)))?;
                ToolCall::Navigate(args)
            }
            "click_element" => ToolCall::ClickElement(decode(args)?),
            "type_text" => ToolCall::TypeText(decode(args)?),
            "screenshot" => ToolCall::Screenshot(decode(args)?),
            "get_element_text" => ToolCall::GetElementText(decode(args)?),
            "wait_for_element" => ToolCall::WaitForElement(decode(args)?),
            "evaluate_javascript" => ToolCall::EvaluateJavascript(decode(args)?),
            "get_console_logs" => ToolCall::GetConsoleLogs(decode(args)?),
            "get_page_info" => ToolCall::GetPageInfo,
            "close_browser" => ToolCall::CloseBrowser,
            "analyze_screenshot" => ToolCall::AnalyzeScreenshot(decode(args)?),
            "scroll" => ToolCall::Scroll(decode(args)?),
            "check_scrollability" => ToolCall::CheckScrollability(decode(args)?),
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::LaunchBrowser(_) => "launch_browser",
            ToolCall::Navigate(_) => "navigate",
            ToolCall::ClickElement(_) => "click_element",
            ToolCall::TypeText(_) => "type_text",
            ToolCall::Screenshot(_) => "screenshot",
            ToolCall::GetElementText(_) => "get_element_text",
            ToolCall::WaitForElement(_) => "wait_for_element",
            ToolCall::EvaluateJavascript(_) => "evaluate_javascript",
            ToolCall::GetConsoleLogs(_) => "get_console_logs",
            ToolCall::GetPageInfo => "get_page_info",
            ToolCall::CloseBrowser => "close_browser",
            ToolCall::AnalyzeScreenshot(_) => "analyze_screenshot",
            ToolCall::Scroll(_) => "scroll",
            ToolCall::CheckScrollability(_) => "check_scrollability",
        }
    }

    /// Whether the tool can only run against an open page.
    pub fn requires_page(&self) -> bool {
        !matches!(self, ToolCall::LaunchBrowser(_) | ToolCall::CloseBrowser)
    }
}

fn decode<T: DeserializeOwned>(args: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args)).map_err(|e| ToolError::invalid("arguments", e.to_string()))
}

/// Round a caller-supplied scroll distance, clamped to what `window.scrollBy` can take.
pub fn scroll_pixels(pixels: f64) -> i64 {
    let limit = f64::from(i32::MAX);
    pixels.clamp(-limit, limit).round() as i64
}

/// Convert a caller-supplied millisecond count; negatives clamp to zero.
pub fn millis(ms: f64) -> Duration {
    Duration::from_millis(ms.max(0.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_tool_parses_with_minimal_arguments() {
        let minimal = |name: &str| match name {
            "navigate" => json!({"url": "https://example.com"}),
            "click_element" | "get_element_text" | "wait_for_element" => json!({"selector": "#a"}),
            "type_text" => json!({"selector": "#a", "text": "hi"}),
            "evaluate_javascript" => json!({"script": "1"}),
            _ => json!({}),
        };
        for def in schema::list_tools() {
            let call = ToolCall::parse(def.name, Some(&minimal(def.name)))
                .unwrap_or_else(|e| panic!("{} failed: {e}", def.name));
            assert_eq!(call.name(), def.name);
        }
    }

    #[test]
    fn every_enum_choice_decodes() {
        for engine in schema::ENGINES {
            ToolCall::parse("launch_browser", Some(&json!({"browser": engine}))).unwrap();
        }
        for state in schema::ELEMENT_STATES {
            ToolCall::parse("wait_for_element", Some(&json!({"selector": "a", "state": state}))).unwrap();
        }
        for level in schema::CONSOLE_LEVELS {
            ToolCall::parse("get_console_logs", Some(&json!({"level": level}))).unwrap();
        }
        for dir in schema::SCROLL_DIRECTIONS {
            for behavior in schema::SCROLL_BEHAVIORS {
                ToolCall::parse("scroll", Some(&json!({"direction": dir, "behavior": behavior}))).unwrap();
            }
        }
        for axis in schema::SCROLL_AXES {
            ToolCall::parse("check_scrollability", Some(&json!({"direction": axis}))).unwrap();
        }
    }

    #[test]
    fn scroll_defaults() {
        let call = ToolCall::parse("scroll", None).unwrap();
        assert_eq!(
            call,
            ToolCall::Scroll(ScrollArgs {
                direction: ScrollDirection::Down,
                pixels: 100.0,
                behavior: ScrollBehavior::Auto,
            })
        );
    }

    #[test]
    fn launch_viewport_converts() {
        let call = ToolCall::parse(
            "launch_browser",
            Some(&json!({"browser": "chromium", "headless": false, "viewport": {"width": 1024.4}})),
        )
        .unwrap();
        let ToolCall::LaunchBrowser(args) = call else {
            panic!("wrong variant");
        };
        assert!(!args.headless);
        assert_eq!(
            args.viewport.unwrap().to_viewport(),
            Viewport { width: 1024, height: 720 }
        );
    }

    #[test]
    fn navigate_rejects_relative_url() {
        let err = ToolCall::parse("navigate", Some(&json!({"url": "example"}))).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { ref field, .. } if field == "url"));
    }

    #[test]
    fn analyze_defaults_model() {
        let ToolCall::AnalyzeScreenshot(args) = ToolCall::parse("analyze_screenshot", None).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(args.model, schema::DEFAULT_DESCRIBE_MODEL);
        assert!(!args.detailed);
        assert!(args.path.is_none());
    }

    #[test]
    fn page_requirement() {
        assert!(!ToolCall::CloseBrowser.requires_page());
        assert!(ToolCall::GetPageInfo.requires_page());
    }

    #[test]
    fn millis_clamps_negative() {
        assert_eq!(millis(-5.0), Duration::ZERO);
        assert_eq!(millis(1500.0), Duration::from_millis(1500));
    }

    #[test]
    fn scroll_pixels_are_rounded_and_bounded() {
        assert_eq!(scroll_pixels(12.6), 13);
        assert_eq!(scroll_pixels(-1e19), -i64::from(i32::MAX));
        assert_eq!(scroll_pixels(1e300), i64::from(i32::MAX));
    }
}
