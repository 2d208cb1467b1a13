use agency_models::{AgencyConfig, PipelineKind};
use tracing::info;

use crate::agent::{build_agent, build_single_agent, tools_for, Agent};
use crate::composer::{compose, Pipeline};
use crate::error::AgentError;
use crate::loader::ConfigLoader;

/// Load agent documents, build agents and compose the configured pipeline.
///
/// Any missing or invalid document fails the whole assembly.
pub fn assemble(config: &AgencyConfig, loader: &ConfigLoader) -> Result<Pipeline, AgentError> {
    let layout = &config.pipeline;
    info!(kind = ?layout.kind, dir = %loader.dir().display(), "Assembling pipeline");

    let agents = match layout.kind {
        PipelineKind::Single => vec![build_single_agent(&config.single)?],
        PipelineKind::Parallel | PipelineKind::Sequential | PipelineKind::SupervisorTool => {
            let mut agents = layout
                .specialists
                .iter()
                .map(|file| load_agent(loader, file))
                .collect::<Result<Vec<_>, _>>()?;
            agents.push(load_agent(loader, &layout.supervisor)?);
            agents
        }
    };

    compose(layout.kind, layout, agents)
}

fn load_agent(loader: &ConfigLoader, file_name: &str) -> Result<Agent, AgentError> {
    let config = loader.load_named(file_name)?;
    let tools = tools_for(&config)?;
    Ok(build_agent(&config, tools))
}
