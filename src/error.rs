use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

/// Every way a tool call can fail. Each variant ends up as the text of an
/// error envelope; none of them escape the dispatcher.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("No browser page available. Launch a browser first.")]
    NoActivePage,

    #[error("Tool call cancelled: server is shutting down")]
    Cancelled,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to save screenshot to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
