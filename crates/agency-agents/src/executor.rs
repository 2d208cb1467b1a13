use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::Agent;
use crate::composer::Pipeline;
use crate::error::AgentError;
use crate::runtime::{AgentInput, AgentRuntime};
use crate::services::{Services, SharedSession};

/// Outcome of one agent turn within a run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRunReport {
    pub agent_name: String,
    pub output_key: Option<String>,
    pub succeeded: bool,
    /// Agent output, or the failure message.
    pub output: String,
    pub elapsed_ms: u64,
}

/// Result of running a pipeline once.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub invocation_id: Uuid,
    pub session_id: String,
    /// Output of the last stage to produce one.
    pub final_output: Option<String>,
    pub agent_reports: Vec<AgentRunReport>,
    /// Session state after the run.
    pub state: Map<String, Value>,
    pub processing_time_ms: u64,
}

struct RunContext {
    invocation_id: Uuid,
    session: SharedSession,
    user_message: String,
    reports: Mutex<Vec<AgentRunReport>>,
}

/// Walks a pipeline, handing each agent turn to the runtime.
///
/// Parallel members run concurrently and a failed member is logged and
/// reported without aborting the run. Sequential members run in order and
/// the first failure aborts.
pub struct PipelineExecutor {
    runtime: Arc<dyn AgentRuntime>,
    services: Services,
}

impl PipelineExecutor {
    pub fn new(runtime: Arc<dyn AgentRuntime>, services: Services) -> Self {
        Self { runtime, services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub async fn run(
        &self,
        pipeline: &Pipeline,
        session_id: &str,
        user_message: &str,
    ) -> Result<RunReport, AgentError> {
        let start = Instant::now();
        let session = self.services.sessions.get_or_create(session_id).await;
        session.write().await.push_event("user", user_message);

        let ctx = RunContext {
            invocation_id: Uuid::new_v4(),
            session: Arc::clone(&session),
            user_message: user_message.to_string(),
            reports: Mutex::new(Vec::new()),
        };
        info!(pipeline = %pipeline.name(), session = session_id, invocation = %ctx.invocation_id, "Starting run");

        let result = self.run_stage(pipeline, &ctx).await;

        let snapshot = session.read().await.clone();
        self.services.memory.add_session_to_memory(&snapshot).await;

        let final_output = result?;
        let agent_reports = ctx
            .reports
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        info!(
            pipeline = %pipeline.name(),
            agents = agent_reports.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Run complete"
        );

        Ok(RunReport {
            invocation_id: ctx.invocation_id,
            session_id: session_id.to_string(),
            final_output,
            agent_reports,
            state: snapshot.state,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn run_stage<'a>(
        &'a self,
        stage: &'a Pipeline,
        ctx: &'a RunContext,
    ) -> BoxFuture<'a, Result<Option<String>, AgentError>> {
        async move {
            match stage {
                Pipeline::Agent(agent) => self.run_agent(agent, ctx).await.map(Some),
                Pipeline::Sequential { stages, .. } => {
                    let mut last = None;
                    for member in stages {
                        if let Some(output) = self.run_stage(member, ctx).await? {
                            last = Some(output);
                        }
                    }
                    Ok(last)
                }
                Pipeline::Parallel { name, stages, .. } => {
                    let results =
                        join_all(stages.iter().map(|member| self.run_stage(member, ctx))).await;
                    let mut last = None;
                    for (member, result) in stages.iter().zip(results) {
                        match result {
                            Ok(Some(output)) => last = Some(output),
                            Ok(None) => {}
                            Err(e) => {
                                warn!(group = %name, member = %member.name(), error = %e, "Parallel member failed");
                            }
                        }
                    }
                    Ok(last)
                }
            }
        }
        .boxed()
    }

    async fn run_agent(&self, agent: &Agent, ctx: &RunContext) -> Result<String, AgentError> {
        let input = {
            let session = ctx.session.read().await;
            AgentInput {
                invocation_id: ctx.invocation_id,
                session_id: session.id.clone(),
                user_message: ctx.user_message.clone(),
                state: session.state.clone(),
            }
        };

        let agent_start = Instant::now();
        let result = self.runtime.run_agent(agent, &input).await;
        let elapsed_ms = agent_start.elapsed().as_millis() as u64;

        let report = match &result {
            Ok(output) => {
                let mut session = ctx.session.write().await;
                if let Some(key) = &agent.output_key {
                    session
                        .state
                        .insert(key.clone(), Value::String(output.clone()));
                }
                session.push_event(&agent.name, output);
                info!(agent = %agent.name, elapsed_ms, "Agent succeeded");
                AgentRunReport {
                    agent_name: agent.name.clone(),
                    output_key: agent.output_key.clone(),
                    succeeded: true,
                    output: output.clone(),
                    elapsed_ms,
                }
            }
            Err(e) => {
                warn!(agent = %agent.name, error = %e, elapsed_ms, "Agent failed");
                AgentRunReport {
                    agent_name: agent.name.clone(),
                    output_key: agent.output_key.clone(),
                    succeeded: false,
                    output: format!("Agent failed: {e}"),
                    elapsed_ms,
                }
            }
        };

        ctx.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(report);
        result
    }
}
