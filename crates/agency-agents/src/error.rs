use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Agent config parse error in {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid agent config: {0}")]
    InvalidConfig(String),

    #[error("Agent runtime error: {0}")]
    Runtime(String),

    #[error("Agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("Tool error: {0}")]
    Tool(#[from] agency_tools::ToolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
