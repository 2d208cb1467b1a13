use std::sync::Arc;

use agency_models::{AgentConfig, SingleAgentConfig, DEFAULT_MODEL};
use agency_tools::{FunctionTool, McpToolset};
use tracing::debug;

use crate::error::AgentError;
use crate::loader::is_identifier;

pub const DEFAULT_AGENT_NAME: &str = "agent";

/// A configured unit: model, instruction and the tools it may call.
#[derive(Debug, Clone)]
pub struct Agent {
    pub model: String,
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub tools: Vec<ToolHandle>,
    pub output_key: Option<String>,
}

/// A capability an agent may invoke.
#[derive(Debug, Clone)]
pub enum ToolHandle {
    /// External tool server restricted to an allow-list.
    Mcp(McpToolset),
    /// In-process built-in tool.
    Function(FunctionTool),
    /// Another agent exposed as a callable tool.
    Agent(Arc<Agent>),
}

impl ToolHandle {
    /// Whether calling `operation` through this handle is permitted.
    pub fn allows(&self, operation: &str) -> bool {
        match self {
            ToolHandle::Mcp(toolset) => toolset.allows(operation),
            ToolHandle::Function(tool) => tool.name() == operation,
            ToolHandle::Agent(agent) => agent.name == operation,
        }
    }

    /// Operation names granted by this handle.
    pub fn operations(&self) -> Vec<String> {
        match self {
            ToolHandle::Mcp(toolset) => toolset.tool_filter.clone(),
            ToolHandle::Function(tool) => vec![tool.name().to_string()],
            ToolHandle::Agent(agent) => vec![agent.name.clone()],
        }
    }
}

impl Agent {
    pub fn can_call(&self, operation: &str) -> bool {
        self.tools.iter().any(|tool| tool.allows(operation))
    }

    /// The allow-list of the first external tool server handle, if any.
    pub fn mcp_allow_list(&self) -> Option<&[String]> {
        self.tools.iter().find_map(|tool| match tool {
            ToolHandle::Mcp(toolset) => Some(toolset.tool_filter.as_slice()),
            _ => None,
        })
    }

    /// Sub-agents reachable as tools.
    pub fn agent_tools(&self) -> impl Iterator<Item = &Arc<Agent>> {
        self.tools.iter().filter_map(|tool| match tool {
            ToolHandle::Agent(agent) => Some(agent),
            _ => None,
        })
    }
}

/// Construct an agent from its document and the tools it is given.
///
/// Missing fields fall back silently: model to [`DEFAULT_MODEL`], text
/// fields to empty.
pub fn build_agent(config: &AgentConfig, tools: Vec<ToolHandle>) -> Agent {
    let agent = Agent {
        model: config.model_or_default().to_string(),
        name: config
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
        description: config.description.clone().unwrap_or_default(),
        instruction: config.instruction.clone().unwrap_or_default(),
        tools,
        output_key: config.output_key.clone(),
    };
    debug!(agent = %agent.name, model = %agent.model, tools = agent.tools.len(), "Built agent");
    agent
}

/// Tools declared by an agent document.
///
/// An external tool server handle is attached only when the document has
/// an `mcp_tool_filter` key; an empty filter still grants nothing.
pub fn tools_for(config: &AgentConfig) -> Result<Vec<ToolHandle>, AgentError> {
    let mut tools = Vec::new();
    if let Some(filter) = &config.tools.mcp_tool_filter {
        tools.push(ToolHandle::Mcp(McpToolset::bybit(Some(filter.clone()))));
    }
    for name in &config.tools.functions {
        tools.push(ToolHandle::Function(FunctionTool::from_name(name)?));
    }
    Ok(tools)
}

/// Directly configured agent with a fixed allow-list, no document involved.
pub fn build_single_agent(config: &SingleAgentConfig) -> Result<Agent, AgentError> {
    if !is_identifier(&config.name) {
        return Err(AgentError::InvalidConfig(format!(
            "agent name '{}' must be an identifier",
            config.name
        )));
    }

    let mut tools = vec![ToolHandle::Mcp(McpToolset::bybit(Some(
        config.mcp_tool_filter.clone(),
    )))];
    for name in &config.functions {
        tools.push(ToolHandle::Function(FunctionTool::from_name(name)?));
    }

    let model = if config.model.trim().is_empty() {
        DEFAULT_MODEL.to_string()
    } else {
        config.model.clone()
    };

    Ok(Agent {
        model,
        name: config.name.clone(),
        description: config.description.clone(),
        instruction: config.instruction.clone(),
        tools,
        output_key: None,
    })
}
