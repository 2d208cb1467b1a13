use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::env::{build_external_credentials, API_KEY_VAR, API_SECRET_VAR};

/// Launcher for the market-data tool server.
pub const MCP_COMMAND: &str = "uvx";
/// Pinned tool server package.
pub const MCP_PACKAGE: &str = "bybit-mcp==0.1.10";

/// How to launch the external tool server over stdio.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StdioServerParams {
    pub command: String,
    pub args: Vec<String>,
    /// Layered over the inherited process environment at spawn time.
    #[serde(skip_serializing)]
    pub env: BTreeMap<String, String>,
}

impl StdioServerParams {
    pub fn bybit(env: BTreeMap<String, String>) -> Self {
        Self {
            command: MCP_COMMAND.to_string(),
            args: vec![MCP_PACKAGE.to_string()],
            env,
        }
    }
}

/// Handle to the external tool server restricted to an allow-list.
///
/// Construction never starts the process. Unknown filter entries are kept
/// as given; the server rejects them on first use.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct McpToolset {
    pub connection: StdioServerParams,
    pub tool_filter: Vec<String>,
}

impl McpToolset {
    /// Build a toolset for the Bybit server with credentials from the
    /// current process environment.
    pub fn bybit<I, S>(tool_filter: Option<I>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(StdioServerParams::bybit(build_external_credentials()), tool_filter)
    }

    pub fn new<I, S>(connection: StdioServerParams, tool_filter: Option<I>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tool_filter: Vec<String> = tool_filter
            .map(|filter| filter.into_iter().map(Into::into).collect())
            .unwrap_or_default();
        debug!(command = %connection.command, granted = tool_filter.len(), "Built MCP toolset");
        Self {
            connection,
            tool_filter,
        }
    }

    /// Explicit allow-list: an empty filter grants nothing.
    pub fn allows(&self, operation: &str) -> bool {
        self.tool_filter.iter().any(|granted| granted == operation)
    }

    /// Stdio server entry for a model client's MCP configuration.
    ///
    /// The credential pair is left out; it reaches the server through the
    /// client's environment so it never appears on a command line.
    pub fn server_entry(&self) -> Value {
        let env: BTreeMap<&str, &str> = self
            .connection
            .env
            .iter()
            .filter(|(name, _)| !is_secret(name))
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        json!({
            "type": "stdio",
            "command": self.connection.command,
            "args": self.connection.args,
            "env": env,
        })
    }

    /// Allow-list entries as the client names them under `server`.
    pub fn qualified_tools(&self, server: &str) -> Vec<String> {
        self.tool_filter
            .iter()
            .map(|tool| format!("mcp__{server}__{tool}"))
            .collect()
    }
}

fn is_secret(name: &str) -> bool {
    name == API_KEY_VAR || name == API_SECRET_VAR
}
