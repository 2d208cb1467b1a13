use serde::{Deserialize, Serialize};

/// Model used when an agent document does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Per-agent document loaded from the configuration directory.
///
/// Every field is optional in the file. Defaults are applied by the agent
/// factory, not here, so a loaded config still shows what the file said.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Session-state key under which this agent's final text is stored.
    #[serde(default)]
    pub output_key: Option<String>,
}

/// Tool section of an agent document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Operation names granted on the external market-data tool server.
    /// `None` and an empty list both grant nothing.
    #[serde(default)]
    pub mcp_tool_filter: Option<Vec<String>>,
    /// Built-in function tools by name (e.g. `get_current_time`).
    #[serde(default)]
    pub functions: Vec<String>,
}

impl AgentConfig {
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn tool_filter(&self) -> &[String] {
        self.tools.mcp_tool_filter.as_deref().unwrap_or(&[])
    }
}
