pub mod agent_config;
pub mod config;
pub mod tool_result;

pub use agent_config::{AgentConfig, ToolsConfig, DEFAULT_MODEL};
pub use config::{
    AgencyConfig, ObservabilityConfig, PipelineConfig, PipelineKind, RuntimeConfig,
    SessionsConfig, SingleAgentConfig,
};
pub use tool_result::{MarketData, PriceReport, TimeReport, ToolOutcome};
