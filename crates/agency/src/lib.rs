//! Crypto Agency - configuration-driven multi-agent market analysis
//!
//! Agents are declared in YAML documents, wired to an allow-listed market
//! data tool server, and composed into a parallel, sequential,
//! supervisor-as-tool or single-agent pipeline.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use agency::models::{AgencyConfig, PipelineKind};
//! use agency::agents::{assemble, ConfigLoader, PipelineExecutor};
//! use agency::tools::{build_external_credentials, McpToolset};
//! ```

pub mod bootstrap;

pub use agency_agents as agents;
pub use agency_models as models;
pub use agency_tools as tools;

use std::path::Path;
use std::sync::Arc;

use agency_agents::{
    assemble, AgentError, CliRuntime, ConfigLoader, Pipeline, PipelineExecutor, Services,
};
use agency_models::AgencyConfig;
use anyhow::Context;

/// Read the top-level TOML config. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AgencyConfig, anyhow::Error> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No agency config file, using defaults");
        return Ok(AgencyConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Compose the configured pipeline from the agent documents in `config_dir`.
pub fn build_pipeline(config: &AgencyConfig, config_dir: &Path) -> Result<Pipeline, AgentError> {
    assemble(config, &ConfigLoader::new(config_dir))
}

/// Executor backed by the CLI runtime and freshly constructed
/// process-lifetime services.
///
/// Fails when the configured client cannot serve a model some agent in
/// `pipeline` would be sent.
pub fn build_executor(
    config: &AgencyConfig,
    pipeline: &Pipeline,
) -> Result<PipelineExecutor, AgentError> {
    let runtime = CliRuntime::new(config.runtime.clone())?;
    runtime.check_pipeline(pipeline)?;
    Ok(PipelineExecutor::new(
        Arc::new(runtime),
        Services::from_config(&config.sessions),
    ))
}
