use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("City '{city}' not supported. Available cities: {supported}")]
    UnknownCity { city: String, supported: String },

    #[error("Could not connect to time service for {city}: {message}")]
    Network { city: String, message: String },

    #[error("{0}")]
    ExternalToolFailure(String),

    #[error(
        "Bybit API credentials not configured. Please set BYBIT_API_KEY and BYBIT_API_SECRET environment variables."
    )]
    CredentialsMissing,

    #[error("{0} timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("Unknown function tool: {0}")]
    UnknownFunction(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
