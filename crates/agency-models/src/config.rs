use serde::{Deserialize, Serialize};

/// Top-level configuration for the agency binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgencyConfig {
    pub pipeline: PipelineConfig,
    pub single: SingleAgentConfig,
    pub runtime: RuntimeConfig,
    pub sessions: SessionsConfig,
    pub observability: ObservabilityConfig,
}

/// Which composition strategy the pipeline composer applies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Specialists run concurrently, then the supervisor runs once.
    #[default]
    Parallel,
    /// Specialists run one after another, then the supervisor.
    Sequential,
    /// The supervisor receives each specialist as a callable tool.
    SupervisorTool,
    /// One directly configured agent, no agent documents involved.
    Single,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub kind: PipelineKind,
    /// Name of the root workflow.
    pub name: String,
    pub description: String,
    /// Name of the concurrent specialist group (parallel kind only).
    pub parallel_name: String,
    pub parallel_description: String,
    /// Agent document file names for the specialists, in order.
    pub specialists: Vec<String>,
    /// Agent document file name for the supervisor.
    pub supervisor: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            kind: PipelineKind::Parallel,
            name: "crypto_trading_workflow".to_string(),
            description: "Supervisor orchestrates analyst and position manager outputs for final guidance."
                .to_string(),
            parallel_name: "crypto_parallel_specialists".to_string(),
            parallel_description:
                "Runs market analyst and position manager in parallel to accelerate decision-making."
                    .to_string(),
            specialists: vec![
                "market_analyst.yaml".to_string(),
                "position_manager.yaml".to_string(),
            ],
            supervisor: "crypto_trading_supervisor.yaml".to_string(),
        }
    }
}

/// Directly configured agent used by [`PipelineKind::Single`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SingleAgentConfig {
    pub model: String,
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub mcp_tool_filter: Vec<String>,
    pub functions: Vec<String>,
}

impl Default for SingleAgentConfig {
    fn default() -> Self {
        Self {
            model: crate::agent_config::DEFAULT_MODEL.to_string(),
            name: "crypto_agent".to_string(),
            description: "Answers crypto market questions with live Bybit data.".to_string(),
            instruction: "You are a crypto market assistant. Use the Bybit tools to look up \
                          prices and the time tool when the user asks about local times."
                .to_string(),
            mcp_tool_filter: vec!["get_tickers".to_string()],
            functions: vec!["get_current_time".to_string()],
        }
    }
}

/// Settings for the external agent runtime invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Executable that runs one agent turn.
    pub command: String,
    /// Arguments placed before the turn flags.
    pub args: Vec<String>,
    /// Replaces every agent's configured model when set.
    pub model_override: Option<String>,
    /// Model name prefixes `command` can serve. Empty accepts any model.
    pub model_prefixes: Vec<String>,
    /// Per-agent turn timeout in seconds.
    pub timeout_seconds: u64,
    /// Function or sub-agent calls allowed within one agent turn.
    pub max_tool_rounds: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: Vec::new(),
            model_override: None,
            model_prefixes: ["claude", "sonnet", "opus", "haiku"]
                .map(String::from)
                .to_vec(),
            timeout_seconds: 120,
            max_tool_rounds: 8,
        }
    }
}

impl RuntimeConfig {
    /// Model sent to `command` for an agent configured with `agent_model`.
    pub fn effective_model<'a>(&'a self, agent_model: &'a str) -> &'a str {
        self.model_override.as_deref().unwrap_or(agent_model)
    }

    pub fn serves_model(&self, model: &str) -> bool {
        self.model_prefixes.is_empty()
            || self
                .model_prefixes
                .iter()
                .any(|prefix| model.starts_with(prefix.as_str()))
    }
}

/// Bounds for the in-process session store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionsConfig {
    pub max_sessions: u64,
    /// Sessions untouched for this long are evicted.
    pub idle_timeout_seconds: u64,
    /// Long-term memory keeps at most this many events; oldest go first.
    pub max_memory_entries: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1_000,
            idle_timeout_seconds: 3_600,
            max_memory_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub trace_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            trace_name: "crypto_trading_agent".to_string(),
        }
    }
}
