//! Static registry of the tools this server exposes.
//!
//! Each tool declares its arguments once. The same declaration answers
//! "list tools" (as a JSON input schema) and validates incoming arguments,
//! substituting defaults for anything the caller left out.

use serde_json::{json, Map, Value};

use crate::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Str(&'static str),
    Int(i64),
    Bool(bool),
}

impl DefaultValue {
    pub fn to_json(self) -> Value {
        match self {
            DefaultValue::Str(s) => json!(s),
            DefaultValue::Int(n) => json!(n),
            DefaultValue::Bool(b) => json!(b),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Enum(&'static [&'static str]),
    Object(&'static [FieldSpec]),
}

impl FieldKind {
    fn json_type(&self) -> &'static str {
        match self {
            FieldKind::String | FieldKind::Enum(_) => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub description: &'static str,
}

const fn required(name: &'static str, kind: FieldKind, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
        default: None,
        description,
    }
}

const fn optional(name: &'static str, kind: FieldKind, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
        default: None,
        description,
    }
}

const fn defaulted(
    name: &'static str,
    kind: FieldKind,
    default: DefaultValue,
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
        default: Some(default),
        description,
    }
}

#[derive(Debug)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [FieldSpec],
}

pub const ENGINES: &[&str] = &["chromium", "firefox", "webkit"];
pub const ELEMENT_STATES: &[&str] = &["attached", "detached", "visible", "hidden"];
pub const CONSOLE_LEVELS: &[&str] = &["log", "info", "warn", "error", "debug"];
pub const SCROLL_DIRECTIONS: &[&str] = &["down", "up", "right", "left"];
pub const SCROLL_BEHAVIORS: &[&str] = &["auto", "smooth"];
pub const SCROLL_AXES: &[&str] = &["both", "vertical", "horizontal"];

/// Model the describer uses when the caller does not pick one.
pub const DEFAULT_DESCRIBE_MODEL: &str = "gemma3:4b";

const VIEWPORT_FIELDS: &[FieldSpec] = &[
    defaulted("width", FieldKind::Number, DefaultValue::Int(1280), "Viewport width in pixels"),
    defaulted("height", FieldKind::Number, DefaultValue::Int(720), "Viewport height in pixels"),
];

static TOOLS: &[ToolDefinition] = &[
    ToolDefinition {
        name: "launch_browser",
        description: "Launch a new browser instance (chromium, firefox, or webkit)",
        fields: &[
            defaulted("browser", FieldKind::Enum(ENGINES), DefaultValue::Str("chromium"), "Browser engine to use"),
            defaulted("headless", FieldKind::Boolean, DefaultValue::Bool(true), "Run browser in headless mode"),
            optional("viewport", FieldKind::Object(VIEWPORT_FIELDS), "Viewport size for the new page"),
        ],
    },
    ToolDefinition {
        name: "navigate",
        description: "Navigate to a URL",
        fields: &[
            required("url", FieldKind::String, "URL to navigate to"),
            defaulted("waitForLoad", FieldKind::Boolean, DefaultValue::Bool(true), "Wait for page to fully load"),
        ],
    },
    ToolDefinition {
        name: "click_element",
        description: "Click on an element by CSS selector",
        fields: &[
            required("selector", FieldKind::String, "CSS selector for the element to click"),
            defaulted("timeout", FieldKind::Number, DefaultValue::Int(5000), "Timeout in milliseconds"),
        ],
    },
    ToolDefinition {
        name: "type_text",
        description: "Type text into an input field",
        fields: &[
            required("selector", FieldKind::String, "CSS selector for the input element"),
            required("text", FieldKind::String, "Text to type"),
            defaulted("delay", FieldKind::Number, DefaultValue::Int(100), "Delay between keystrokes in milliseconds"),
        ],
    },
    ToolDefinition {
        name: "screenshot",
        description: "Take a screenshot of the current page",
        fields: &[
            defaulted("fullPage", FieldKind::Boolean, DefaultValue::Bool(false), "Capture full scrollable page"),
            optional("path", FieldKind::String, "Path to save screenshot (optional)"),
        ],
    },
    ToolDefinition {
        name: "get_element_text",
        description: "Get text content of an element",
        fields: &[
            required("selector", FieldKind::String, "CSS selector for the element"),
            defaulted("timeout", FieldKind::Number, DefaultValue::Int(5000), "Timeout in milliseconds"),
        ],
    },
    ToolDefinition {
        name: "wait_for_element",
        description: "Wait for an element to appear or disappear",
        fields: &[
            required("selector", FieldKind::String, "CSS selector for the element"),
            defaulted("timeout", FieldKind::Number, DefaultValue::Int(30000), "Timeout in milliseconds"),
            defaulted("state", FieldKind::Enum(ELEMENT_STATES), DefaultValue::Str("visible"), "State to wait for"),
        ],
    },
    ToolDefinition {
        name: "evaluate_javascript",
        description: "Execute JavaScript in the browser context",
        fields: &[required("script", FieldKind::String, "JavaScript code to execute")],
    },
    ToolDefinition {
        name: "get_console_logs",
        description: "Get console messages captured from the current page",
        fields: &[
            optional("level", FieldKind::Enum(CONSOLE_LEVELS), "Only return messages at this level"),
            defaulted("clear", FieldKind::Boolean, DefaultValue::Bool(false), "Clear all captured messages after reading"),
        ],
    },
    ToolDefinition {
        name: "get_page_info",
        description: "Get information about the current page",
        fields: &[],
    },
    ToolDefinition {
        name: "close_browser",
        description: "Close the current browser instance",
        fields: &[],
    },
    ToolDefinition {
        name: "analyze_screenshot",
        description: "Take a screenshot and describe it with a local vision model",
        fields: &[
            defaulted("fullPage", FieldKind::Boolean, DefaultValue::Bool(false), "Capture full scrollable page"),
            optional("path", FieldKind::String, "Path to save screenshot (defaults to a timestamped file)"),
            defaulted("detailed", FieldKind::Boolean, DefaultValue::Bool(false), "Ask for a detailed analysis"),
            optional("pretext", FieldKind::String, "Extra instructions placed before the analysis prompt"),
            defaulted("model", FieldKind::String, DefaultValue::Str(DEFAULT_DESCRIBE_MODEL), "Vision model to use"),
        ],
    },
    ToolDefinition {
        name: "scroll",
        description: "Scroll the page in a direction by a number of pixels",
        fields: &[
            defaulted("direction", FieldKind::Enum(SCROLL_DIRECTIONS), DefaultValue::Str("down"), "Direction to scroll"),
            defaulted("pixels", FieldKind::Number, DefaultValue::Int(100), "Number of pixels to scroll"),
            defaulted("behavior", FieldKind::Enum(SCROLL_BEHAVIORS), DefaultValue::Str("auto"), "Scroll behavior"),
        ],
    },
    ToolDefinition {
        name: "check_scrollability",
        description: "Check whether the page can scroll and how far",
        fields: &[defaulted(
            "direction",
            FieldKind::Enum(SCROLL_AXES),
            DefaultValue::Str("both"),
            "Axis to check",
        )],
    },
];

/// All tools, in the order they are advertised.
pub fn list_tools() -> &'static [ToolDefinition] {
    TOOLS
}

pub fn get_schema(name: &str) -> Result<&'static ToolDefinition, ToolError> {
    TOOLS
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
}

impl ToolDefinition {
    /// Check `raw` against the declared fields and return the normalized
    /// arguments: defaults filled in, undeclared fields dropped.
    ///
    /// Absent and `null` arguments are treated the same.
    pub fn validate(&self, raw: Option<&Value>) -> Result<Map<String, Value>, ToolError> {
        let empty = Map::new();
        let obj = match raw {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(obj)) => obj,
            Some(other) => {
                return Err(ToolError::invalid(
                    "arguments",
                    format!("expected object, got {}", json_kind(other)),
                ))
            }
        };
        validate_fields(self.fields, obj, "")
    }

    /// JSON Schema object describing this tool's arguments.
    pub fn input_schema(&self) -> Map<String, Value> {
        object_schema(self.fields)
    }
}

fn validate_fields(
    fields: &[FieldSpec],
    obj: &Map<String, Value>,
    prefix: &str,
) -> Result<Map<String, Value>, ToolError> {
    let mut out = Map::new();
    for field in fields {
        let path = format!("{prefix}{}", field.name);
        match obj.get(field.name).filter(|v| !v.is_null()) {
            Some(value) => {
                let checked = check_kind(&field.kind, value, &path)?;
                out.insert(field.name.to_string(), checked);
            }
            None => {
                if let Some(default) = field.default {
                    out.insert(field.name.to_string(), default.to_json());
                } else if field.required {
                    return Err(ToolError::MissingArgument(path));
                }
            }
        }
    }
    Ok(out)
}

fn check_kind(kind: &FieldKind, value: &Value, path: &str) -> Result<Value, ToolError> {
    let mismatch = || {
        ToolError::invalid(
            path,
            format!("expected {}, got {}", kind.json_type(), json_kind(value)),
        )
    };
    match kind {
        FieldKind::String => value.is_string().then(|| value.clone()).ok_or_else(mismatch),
        FieldKind::Number => value.is_number().then(|| value.clone()).ok_or_else(mismatch),
        FieldKind::Boolean => value.is_boolean().then(|| value.clone()).ok_or_else(mismatch),
        FieldKind::Enum(choices) => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if choices.contains(&s) {
                Ok(value.clone())
            } else {
                Err(ToolError::invalid(
                    path,
                    format!("expected one of {}, got '{s}'", choices.join(", ")),
                ))
            }
        }
        FieldKind::Object(fields) => {
            let obj = value.as_object().ok_or_else(mismatch)?;
            validate_fields(fields, obj, &format!("{path}.")).map(Value::Object)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn object_schema(fields: &[FieldSpec]) -> Map<String, Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.to_string(), field_schema(field));
        if field.required {
            required.push(json!(field.name));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    schema
}

fn field_schema(field: &FieldSpec) -> Value {
    let mut schema = match field.kind {
        FieldKind::Object(inner) => object_schema(inner),
        kind => {
            let mut m = Map::new();
            m.insert("type".into(), json!(kind.json_type()));
            if let FieldKind::Enum(choices) = kind {
                m.insert("enum".into(), json!(choices));
            }
            m
        }
    };
    if let Some(default) = field.default {
        schema.insert("default".into(), default.to_json());
    }
    schema.insert("description".into(), json!(field.description));
    Value::Object(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tool_names_are_unique() {
        let names: HashSet<_> = list_tools().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), list_tools().len());
    }

    #[test]
    fn registry_order_is_stable() {
        let names: Vec<_> = list_tools().iter().map(|t| t.name).collect();
        assert_eq!(names.first(), Some(&"launch_browser"));
        assert_eq!(names.last(), Some(&"check_scrollability"));
        assert_eq!(names.len(), 14);
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let err = get_schema("teleport").unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(ref n) if n == "teleport"));
    }

    #[test]
    fn defaults_are_substituted() {
        let args = get_schema("wait_for_element")
            .unwrap()
            .validate(Some(&json!({"selector": "#go"})))
            .unwrap();
        assert_eq!(args["timeout"], json!(30000));
        assert_eq!(args["state"], json!("visible"));
    }

    #[test]
    fn missing_required_field() {
        let err = get_schema("navigate").unwrap().validate(None).unwrap_err();
        assert!(matches!(err, ToolError::MissingArgument(ref f) if f == "url"));
    }

    #[test]
    fn type_mismatch_names_field() {
        let err = get_schema("click_element")
            .unwrap()
            .validate(Some(&json!({"selector": "a", "timeout": "soon"})))
            .unwrap_err();
        match err {
            ToolError::InvalidArgument { field, reason } => {
                assert_eq!(field, "timeout");
                assert!(reason.contains("expected number"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn enum_is_case_sensitive() {
        let err = get_schema("launch_browser")
            .unwrap()
            .validate(Some(&json!({"browser": "Chromium"})))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { ref field, .. } if field == "browser"));
    }

    #[test]
    fn nested_object_validates_recursively() {
        let def = get_schema("launch_browser").unwrap();
        let args = def.validate(Some(&json!({"viewport": {"width": 800}}))).unwrap();
        assert_eq!(args["viewport"], json!({"width": 800, "height": 720}));

        let err = def
            .validate(Some(&json!({"viewport": {"height": true}})))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { ref field, .. } if field == "viewport.height"));
    }

    #[test]
    fn optional_object_stays_absent() {
        let args = get_schema("launch_browser").unwrap().validate(None).unwrap();
        assert!(!args.contains_key("viewport"));
        assert_eq!(args["browser"], json!("chromium"));
        assert_eq!(args["headless"], json!(true));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let args = get_schema("evaluate_javascript")
            .unwrap()
            .validate(Some(&json!({"script": "1+1", "sandbox": true})))
            .unwrap();
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn null_counts_as_absent() {
        let args = get_schema("screenshot")
            .unwrap()
            .validate(Some(&json!({"path": null})))
            .unwrap();
        assert!(!args.contains_key("path"));
    }

    #[test]
    fn non_object_arguments_rejected() {
        let err = get_schema("scroll")
            .unwrap()
            .validate(Some(&json!([1, 2])))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { ref field, .. } if field == "arguments"));
    }

    #[test]
    fn input_schema_lists_required_and_defaults() {
        let schema = get_schema("type_text").unwrap().input_schema();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["required"], json!(["selector", "text"]));
        assert_eq!(schema["properties"]["delay"]["default"], json!(100));

        let schema = get_schema("wait_for_element").unwrap().input_schema();
        assert_eq!(
            schema["properties"]["state"]["enum"],
            json!(["attached", "detached", "visible", "hidden"])
        );
    }

    #[test]
    fn input_schema_nests_objects() {
        let schema = get_schema("launch_browser").unwrap().input_schema();
        let viewport = &schema["properties"]["viewport"];
        assert_eq!(viewport["type"], json!("object"));
        assert_eq!(viewport["properties"]["width"]["default"], json!(1280));
        assert!(schema.get("required").is_none());
    }
}
