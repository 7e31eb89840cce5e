use serde::Serialize;

use crate::error::ToolError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// The single response shape produced for every tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl ResponseEnvelope {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn failure(error: &ToolError) -> Self {
        Self {
            content: vec![ContentBlock::Text {
                text: format!("Error: {error}"),
            }],
            is_error: true,
        }
    }

    /// All text blocks joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Result<String, ToolError>> for ResponseEnvelope {
    fn from(result: Result<String, ToolError>) -> Self {
        match result {
            Ok(text) => ResponseEnvelope::success(text),
            Err(e) => ResponseEnvelope::failure(&e),
        }
    }
}
