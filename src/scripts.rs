//! Page-side JavaScript evaluated through CDP, and parsers for the JSON
//! strings those snippets return.
//!
//! Every snippet is a self-invoking function expression. Selectors and text
//! are embedded as JSON string literals so quotes and newlines survive.

use serde::Deserialize;

use crate::engine::{ScrollBehavior, ScrollDelta, ScrollMetrics, Viewport};

/// Returns JSON: {"width": number, "height": number}.
pub const VIEWPORT_JS: &str = r#"(function() {
    return JSON.stringify({
        width: window.innerWidth || document.documentElement.clientWidth || 0,
        height: window.innerHeight || document.documentElement.clientHeight || 0
    });
})()"#;

/// Returns JSON with the scroll offset and document/viewport extents.
pub const SCROLL_METRICS_JS: &str = r#"(function() {
    var doc = document.documentElement;
    var body = document.body;
    return JSON.stringify({
        scrollX: Math.round(window.scrollX || window.pageXOffset || 0),
        scrollY: Math.round(window.scrollY || window.pageYOffset || 0),
        contentWidth: Math.max(body ? body.scrollWidth : 0, doc ? doc.scrollWidth : 0),
        contentHeight: Math.max(body ? body.scrollHeight : 0, doc ? doc.scrollHeight : 0),
        viewportWidth: window.innerWidth || (doc ? doc.clientWidth : 0),
        viewportHeight: window.innerHeight || (doc ? doc.clientHeight : 0)
    });
})()"#;

/// Quote `s` as a JavaScript string literal.
pub fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into())
}

/// Inspect the first element matching `selector`.
/// Returns JSON: {"attached": bool, "visible": bool, "text": string|null}.
pub fn build_element_status_js(selector: &str) -> String {
    format!(
        "(function() {{ \
            var el = document.querySelector({sel}); \
            if (!el) return JSON.stringify({{attached: false, visible: false, text: null}}); \
            var style = window.getComputedStyle(el); \
            var rect = el.getBoundingClientRect(); \
            var visible = style.visibility !== 'hidden' && style.display !== 'none' \
                && rect.width > 0 && rect.height > 0; \
            return JSON.stringify({{attached: true, visible: visible, text: el.textContent}}); \
        }})()",
        sel = js_string(selector),
    )
}

/// Replace the value of the first element matching `selector` and fire
/// `input`/`change`. Returns 'OK' or 'NOT_FOUND'.
pub fn build_fill_js(selector: &str, text: &str) -> String {
    format!(
        "(function() {{ \
            var el = document.querySelector({sel}); \
            if (!el) return 'NOT_FOUND'; \
            el.focus(); \
            if (el.isContentEditable) {{ el.textContent = {text}; }} else {{ el.value = {text}; }} \
            el.dispatchEvent(new Event('input', {{bubbles: true}})); \
            el.dispatchEvent(new Event('change', {{bubbles: true}})); \
            return 'OK'; \
        }})()",
        sel = js_string(selector),
        text = js_string(text),
    )
}

pub fn build_scroll_js(delta: ScrollDelta, behavior: ScrollBehavior) -> String {
    format!(
        "(function() {{ window.scrollBy({{left: {x}, top: {y}, behavior: '{b}'}}); return 'OK'; }})()",
        x = delta.x,
        y = delta.y,
        b = behavior.as_str(),
    )
}

/// Parsed result of [`build_element_status_js`].
#[derive(Debug, Default, PartialEq, Deserialize)]
pub struct ElementStatus {
    pub attached: bool,
    pub visible: bool,
    pub text: Option<String>,
}

impl ElementStatus {
    /// Malformed replies read as "not attached" (e.g. mid-navigation).
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_default()
    }
}

pub fn parse_viewport_json(json: &str) -> Option<Viewport> {
    let v: Viewport = serde_json::from_str(json).ok()?;
    (v.width > 0 && v.height > 0).then_some(v)
}

pub fn parse_scroll_metrics_json(json: &str) -> Option<ScrollMetrics> {
    serde_json::from_str(json).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_iifes() {
        for js in [VIEWPORT_JS, SCROLL_METRICS_JS] {
            assert!(js.starts_with("(function()"));
            assert!(js.trim_end().ends_with("()"));
        }
    }

    #[test]
    fn selectors_are_quoted() {
        let js = build_element_status_js(r#"input[name="q"]"#);
        assert!(js.contains(r#"document.querySelector("input[name=\"q\"]")"#));
        assert!(js.starts_with("(function()"));
    }

    #[test]
    fn fill_escapes_text() {
        let js = build_fill_js("#a", "it's a \"test\"\nline");
        assert!(js.contains(r#""it's a \"test\"\nline""#));
    }

    #[test]
    fn scroll_js_carries_delta_and_behavior() {
        let js = build_scroll_js(ScrollDelta { x: 0, y: -300 }, ScrollBehavior::Smooth);
        assert!(js.contains("left: 0, top: -300, behavior: 'smooth'"));
    }

    #[test]
    fn element_status_parsing() {
        let p = ElementStatus::from_json(r#"{"attached":true,"visible":false,"text":"Hi"}"#);
        assert!(p.attached);
        assert!(!p.visible);
        assert_eq!(p.text.as_deref(), Some("Hi"));

        let p = ElementStatus::from_json(r#"{"attached":false,"visible":false,"text":null}"#);
        assert_eq!(p, ElementStatus::default());
    }

    #[test]
    fn malformed_status_is_detached() {
        assert!(!ElementStatus::from_json("").attached);
        assert!(!ElementStatus::from_json("{broken").attached);
        assert!(!ElementStatus::from_json("null").attached);
    }

    #[test]
    fn viewport_parsing() {
        assert_eq!(
            parse_viewport_json(r#"{"width":1280,"height":720}"#),
            Some(Viewport { width: 1280, height: 720 })
        );
        assert_eq!(parse_viewport_json(r#"{"width":0,"height":0}"#), None);
        assert_eq!(parse_viewport_json("nope"), None);
    }

    #[test]
    fn scroll_metrics_parsing() {
        let m = parse_scroll_metrics_json(
            r#"{"scrollX":0,"scrollY":40,"contentWidth":1280,"contentHeight":3000,"viewportWidth":1280,"viewportHeight":720}"#,
        )
        .unwrap();
        assert_eq!(m.scroll_y, 40);
        assert_eq!(m.content_height, 3000);
        assert!(parse_scroll_metrics_json(r#"{"scrollY":1}"#).is_none());
    }
}
