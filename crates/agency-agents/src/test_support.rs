//! Test support module providing a scripted agent runtime.
//!
//! `ScriptedRuntime` answers each agent turn from a table keyed by agent
//! name and records what every turn saw, so pipeline wiring and ordering
//! can be checked without a model backend.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Barrier;

use crate::agent::Agent;
use crate::error::AgentError;
use crate::instruction::render_instruction;
use crate::runtime::{AgentInput, AgentRuntime};

/// What one scripted turn observed.
#[derive(Debug, Clone)]
pub struct RecordedTurn {
    pub agent_name: String,
    pub session_id: String,
    pub state: Map<String, Value>,
    /// Instruction after placeholder substitution.
    pub rendered_instruction: String,
}

#[derive(Default)]
pub struct ScriptedRuntime {
    responses: HashMap<String, String>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    rendezvous: Option<(HashSet<String>, Arc<Barrier>)>,
    turns: Mutex<Vec<RecordedTurn>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, agent: &str, output: &str) -> Self {
        self.responses.insert(agent.to_string(), output.to_string());
        self
    }

    pub fn fail(mut self, agent: &str) -> Self {
        self.failing.insert(agent.to_string());
        self
    }

    pub fn delay(mut self, agent: &str, delay: Duration) -> Self {
        self.delays.insert(agent.to_string(), delay);
        self
    }

    /// The listed agents each wait until all of them have started, so a run
    /// only completes if they execute concurrently.
    pub fn rendezvous(mut self, agents: &[&str]) -> Self {
        let names: HashSet<String> = agents.iter().map(|a| a.to_string()).collect();
        let barrier = Arc::new(Barrier::new(names.len()));
        self.rendezvous = Some((names, barrier));
        self
    }

    pub fn turns(&self) -> Vec<RecordedTurn> {
        self.turns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn turn_order(&self) -> Vec<String> {
        self.turns().into_iter().map(|t| t.agent_name).collect()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn run_agent(&self, agent: &Agent, input: &AgentInput) -> Result<String, AgentError> {
        if let Some((names, barrier)) = &self.rendezvous {
            if names.contains(&agent.name) {
                barrier.wait().await;
            }
        }
        if let Some(delay) = self.delays.get(&agent.name) {
            tokio::time::sleep(*delay).await;
        }

        self.turns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedTurn {
                agent_name: agent.name.clone(),
                session_id: input.session_id.clone(),
                state: input.state.clone(),
                rendered_instruction: render_instruction(&agent.instruction, &input.state),
            });

        if self.failing.contains(&agent.name) {
            return Err(AgentError::Runtime(format!("scripted failure for {}", agent.name)));
        }
        Ok(self
            .responses
            .get(&agent.name)
            .cloned()
            .unwrap_or_else(|| format!("{} done", agent.name)))
    }
}
