use std::collections::HashSet;
use std::sync::Arc;

use agency_models::{PipelineConfig, PipelineKind};
use serde::Serialize;
use tracing::info;

use crate::agent::{Agent, ToolHandle};
use crate::error::AgentError;

/// Composed tree of agents. Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub enum Pipeline {
    Agent(Arc<Agent>),
    /// Members have no ordering dependency and may run concurrently.
    Parallel {
        name: String,
        description: String,
        stages: Vec<Pipeline>,
    },
    /// Each member completes before the next starts.
    Sequential {
        name: String,
        description: String,
        stages: Vec<Pipeline>,
    },
}

/// Compose already-built agents into the shape selected by `kind`.
///
/// For every kind except [`PipelineKind::Single`] the last agent is the
/// supervisor and the rest are specialists. `Single` takes exactly one agent.
pub fn compose(
    kind: PipelineKind,
    layout: &PipelineConfig,
    mut agents: Vec<Agent>,
) -> Result<Pipeline, AgentError> {
    check_unique(&agents)?;

    let pipeline = match kind {
        PipelineKind::Single => {
            if agents.len() != 1 {
                return Err(AgentError::InvalidConfig(format!(
                    "single pipeline takes exactly one agent, got {}",
                    agents.len()
                )));
            }
            Pipeline::Agent(Arc::new(agents.remove(0)))
        }
        PipelineKind::SupervisorTool => {
            let (specialists, mut supervisor) = split_team(agents)?;
            supervisor
                .tools
                .extend(specialists.into_iter().map(ToolHandle::Agent));
            Pipeline::Agent(Arc::new(supervisor))
        }
        PipelineKind::Parallel => {
            let (specialists, supervisor) = split_team(agents)?;
            let group = Pipeline::Parallel {
                name: layout.parallel_name.clone(),
                description: layout.parallel_description.clone(),
                stages: specialists.into_iter().map(Pipeline::Agent).collect(),
            };
            Pipeline::Sequential {
                name: layout.name.clone(),
                description: layout.description.clone(),
                stages: vec![group, Pipeline::Agent(Arc::new(supervisor))],
            }
        }
        PipelineKind::Sequential => {
            let (specialists, supervisor) = split_team(agents)?;
            let mut stages: Vec<Pipeline> = specialists.into_iter().map(Pipeline::Agent).collect();
            stages.push(Pipeline::Agent(Arc::new(supervisor)));
            Pipeline::Sequential {
                name: layout.name.clone(),
                description: layout.description.clone(),
                stages,
            }
        }
    };

    info!(kind = ?kind, root = %pipeline.name(), agents = pipeline.agents().len(), "Composed pipeline");
    Ok(pipeline)
}

/// Last agent is the supervisor; at least one specialist must precede it.
fn split_team(mut agents: Vec<Agent>) -> Result<(Vec<Arc<Agent>>, Agent), AgentError> {
    let supervisor = agents
        .pop()
        .ok_or_else(|| AgentError::InvalidConfig("pipeline needs a supervisor agent".to_string()))?;
    if agents.is_empty() {
        return Err(AgentError::InvalidConfig(
            "pipeline needs at least one specialist agent".to_string(),
        ));
    }
    Ok((agents.into_iter().map(Arc::new).collect(), supervisor))
}

/// Agent names and output keys label results, so both must be unique.
fn check_unique(agents: &[Agent]) -> Result<(), AgentError> {
    let mut names = HashSet::new();
    let mut keys = HashSet::new();
    for agent in agents {
        if !names.insert(agent.name.as_str()) {
            return Err(AgentError::InvalidConfig(format!(
                "duplicate agent name '{}'",
                agent.name
            )));
        }
        if let Some(key) = &agent.output_key {
            if !keys.insert(key.as_str()) {
                return Err(AgentError::InvalidConfig(format!(
                    "duplicate output_key '{key}'"
                )));
            }
        }
    }
    Ok(())
}

impl Pipeline {
    pub fn name(&self) -> &str {
        match self {
            Pipeline::Agent(agent) => &agent.name,
            Pipeline::Parallel { name, .. } | Pipeline::Sequential { name, .. } => name,
        }
    }

    /// Agents placed directly in the tree, depth-first. Agents reachable only
    /// as tools are not included.
    pub fn agents(&self) -> Vec<&Arc<Agent>> {
        let mut out = Vec::new();
        self.collect_agents(&mut out);
        out
    }

    fn collect_agents<'a>(&'a self, out: &mut Vec<&'a Arc<Agent>>) {
        match self {
            Pipeline::Agent(agent) => out.push(agent),
            Pipeline::Parallel { stages, .. } | Pipeline::Sequential { stages, .. } => {
                for stage in stages {
                    stage.collect_agents(out);
                }
            }
        }
    }

    pub fn find_agent(&self, name: &str) -> Option<&Arc<Agent>> {
        self.agents().into_iter().find(|agent| agent.name == name)
    }

    pub fn describe(&self) -> PipelineDescription {
        match self {
            Pipeline::Agent(agent) => describe_agent(agent),
            Pipeline::Parallel {
                name,
                description,
                stages,
            } => PipelineDescription::Parallel {
                name: name.clone(),
                description: description.clone(),
                stages: stages.iter().map(Pipeline::describe).collect(),
            },
            Pipeline::Sequential {
                name,
                description,
                stages,
            } => PipelineDescription::Sequential {
                name: name.clone(),
                description: description.clone(),
                stages: stages.iter().map(Pipeline::describe).collect(),
            },
        }
    }
}

/// Serializable view of a pipeline for inspection.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineDescription {
    Agent {
        name: String,
        model: String,
        description: String,
        output_key: Option<String>,
        tools: Vec<ToolDescription>,
    },
    Parallel {
        name: String,
        description: String,
        stages: Vec<PipelineDescription>,
    },
    Sequential {
        name: String,
        description: String,
        stages: Vec<PipelineDescription>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolDescription {
    Mcp {
        command: String,
        args: Vec<String>,
        allow: Vec<String>,
    },
    Function {
        name: String,
        description: String,
    },
    Agent {
        agent: Box<PipelineDescription>,
    },
}

fn describe_agent(agent: &Agent) -> PipelineDescription {
    let tools = agent
        .tools
        .iter()
        .map(|tool| match tool {
            ToolHandle::Mcp(toolset) => ToolDescription::Mcp {
                command: toolset.connection.command.clone(),
                args: toolset.connection.args.clone(),
                allow: toolset.tool_filter.clone(),
            },
            ToolHandle::Function(function) => ToolDescription::Function {
                name: function.name().to_string(),
                description: function.description().to_string(),
            },
            ToolHandle::Agent(sub) => ToolDescription::Agent {
                agent: Box::new(describe_agent(sub)),
            },
        })
        .collect();

    PipelineDescription::Agent {
        name: agent.name.clone(),
        model: agent.model.clone(),
        description: agent.description.clone(),
        output_key: agent.output_key.clone(),
        tools,
    }
}
