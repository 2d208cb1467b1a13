use std::sync::Arc;

use agency_models::RuntimeConfig;
use agency_tools::{BybitCli, HttpTimeApi, ToolBackends};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{Agent, ToolHandle};
use crate::composer::Pipeline;
use crate::error::AgentError;
use crate::instruction::render_instruction;
use crate::model_cli::ModelCli;
use crate::tool_bridge::{
    callable_tools_section, client_tools, parse_tool_call, resolve_call, sub_agent_request,
    ToolCall,
};

/// Everything one agent turn sees.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInput {
    pub invocation_id: Uuid,
    pub session_id: String,
    pub user_message: String,
    /// Snapshot of session state when the turn started.
    pub state: Map<String, Value>,
}

/// Boundary to the external runtime that actually runs an agent turn.
/// Mockable for testing.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run_agent(&self, agent: &Agent, input: &AgentInput) -> Result<String, AgentError>;
}

/// Runs each agent turn through a command-line model client.
///
/// Tool server handles are handed to the client as flags and used inside
/// its own loop. Function and sub-agent calls come back as JSON replies;
/// the runtime runs them and sends the result in the next prompt, up to
/// `max_tool_rounds` per turn.
pub struct CliRuntime {
    config: RuntimeConfig,
    backends: ToolBackends,
}

impl CliRuntime {
    /// Runtime with live tool backends.
    pub fn new(config: RuntimeConfig) -> Result<Self, AgentError> {
        let backends = ToolBackends {
            time: Arc::new(HttpTimeApi::new()?),
            bybit: BybitCli::default(),
        };
        Ok(Self::with_backends(config, backends))
    }

    pub fn with_backends(config: RuntimeConfig, backends: ToolBackends) -> Self {
        Self { config, backends }
    }

    /// Model sent to the client for `agent`. Fails when the client cannot
    /// serve it.
    pub fn model_for(&self, agent: &Agent) -> Result<String, AgentError> {
        let model = self.config.effective_model(&agent.model);
        if !self.config.serves_model(model) {
            return Err(AgentError::InvalidConfig(format!(
                "agent '{}' uses model '{model}', which '{}' does not serve; \
                 set [runtime] model_override",
                agent.name, self.config.command
            )));
        }
        Ok(model.to_string())
    }

    /// Check every agent in the pipeline, including those reachable only as
    /// tools, before any turn runs.
    pub fn check_pipeline(&self, pipeline: &Pipeline) -> Result<(), AgentError> {
        let mut pending: Vec<&Agent> = pipeline.agents().into_iter().map(|a| a.as_ref()).collect();
        while let Some(agent) = pending.pop() {
            self.model_for(agent)?;
            pending.extend(agent.agent_tools().map(|a| a.as_ref()));
        }
        Ok(())
    }

    fn client(&self, agent: &Agent) -> Result<ModelCli, AgentError> {
        let mut cli = ModelCli::new(&self.config, &self.model_for(agent)?);
        let tools = client_tools(agent)?;
        cli.tool_args = tools.args;
        cli.env = tools.env;
        Ok(cli)
    }

    async fn call_tool(&self, agent: &Agent, call: &ToolCall, input: &AgentInput) -> Value {
        match resolve_call(agent, call) {
            Some(ToolHandle::Function(function)) => {
                function.call(&self.backends, &call.arguments).await
            }
            Some(ToolHandle::Agent(sub)) => {
                let sub_input = AgentInput {
                    user_message: sub_agent_request(call),
                    ..input.clone()
                };
                info!(caller = %agent.name, agent = %sub.name, "Calling sub-agent");
                match self.run_agent(sub, &sub_input).await {
                    Ok(output) => json!({"status": "success", "agent": sub.name, "output": output}),
                    Err(e) => json!({"status": "error", "message": e.to_string()}),
                }
            }
            _ => {
                warn!(agent = %agent.name, tool = %call.tool, "Refused tool call");
                json!({
                    "status": "error",
                    "message": format!("Tool '{}' is not available to agent '{}'", call.tool, agent.name),
                })
            }
        }
    }
}

#[async_trait]
impl AgentRuntime for CliRuntime {
    async fn run_agent(&self, agent: &Agent, input: &AgentInput) -> Result<String, AgentError> {
        let client = self.client(agent)?;
        let mut system_prompt = render_instruction(&agent.instruction, &input.state);
        if let Some(section) = callable_tools_section(agent) {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(&section);
        }
        let mut prompt = user_prompt(input)?;
        debug!(agent = %agent.name, tools = agent.tools.len(), "Running agent turn");

        let mut calls = 0;
        loop {
            let reply = client.complete(&system_prompt, &prompt).await?;
            let Some(call) = parse_tool_call(&reply) else {
                return Ok(reply);
            };
            if calls == self.config.max_tool_rounds {
                return Err(AgentError::Runtime(format!(
                    "agent '{}' exceeded {} tool calls in one turn",
                    agent.name, self.config.max_tool_rounds
                )));
            }
            calls += 1;

            debug!(agent = %agent.name, tool = %call.tool, round = calls, "Tool call");
            let result = self.call_tool(agent, &call, input).await;
            prompt.push_str(&format!("\n\n## Tool result: {}\n{result}", call.tool));
        }
    }
}

/// The user message, followed by session state when there is any.
pub fn user_prompt(input: &AgentInput) -> Result<String, AgentError> {
    if input.state.is_empty() {
        return Ok(input.user_message.clone());
    }
    Ok(format!(
        "{}\n\n## Session state\n{}",
        input.user_message,
        serde_json::to_string_pretty(&input.state)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{build_agent, tools_for};
    use agency_models::{AgentConfig, ToolsConfig};
    use agency_tools::{FunctionTool, TimeApi};

    struct FixedTime;

    #[async_trait]
    impl TimeApi for FixedTime {
        async fn fetch(&self, _url: &str) -> Result<String, String> {
            Ok(r#"{"datetime": "2023-10-11T15:30:45+09:00", "utc_offset": "+09:00"}"#.to_string())
        }
    }

    fn input(state: Map<String, Value>) -> AgentInput {
        AgentInput {
            invocation_id: Uuid::new_v4(),
            session_id: "s1".to_string(),
            user_message: "Should I add to BTC?".to_string(),
            state,
        }
    }

    /// Runtime whose model client is `sh -c <script>`; turn flags start at `$1`.
    fn scripted(script: &str) -> CliRuntime {
        CliRuntime::with_backends(
            RuntimeConfig {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string(), "fake-cli".to_string()],
                model_override: Some("sonnet".to_string()),
                ..Default::default()
            },
            ToolBackends {
                time: Arc::new(FixedTime),
                bybit: BybitCli::default(),
            },
        )
    }

    fn agent_with(name: &str, instruction: &str, tools: Vec<ToolHandle>) -> Agent {
        build_agent(
            &AgentConfig {
                name: Some(name.to_string()),
                instruction: Some(instruction.to_string()),
                ..Default::default()
            },
            tools,
        )
    }

    #[test]
    fn prompt_without_state_is_message() {
        assert_eq!(user_prompt(&input(Map::new())).unwrap(), "Should I add to BTC?");
    }

    #[test]
    fn prompt_includes_state() {
        let mut state = Map::new();
        state.insert("market_analysis".to_string(), Value::String("bullish".to_string()));
        let prompt = user_prompt(&input(state)).unwrap();
        assert!(prompt.starts_with("Should I add to BTC?\n\n## Session state\n"));
        assert!(prompt.contains("\"market_analysis\": \"bullish\""));
    }

    #[test]
    fn model_override_wins() {
        let agent = build_agent(
            &AgentConfig {
                model: Some("claude-3-5-haiku-latest".to_string()),
                ..Default::default()
            },
            vec![],
        );

        let runtime = scripted("true");
        assert_eq!(runtime.client(&agent).unwrap().model, "sonnet");

        let runtime = CliRuntime::with_backends(
            RuntimeConfig::default(),
            scripted("true").backends.clone(),
        );
        let cli = runtime.client(&agent).unwrap();
        assert_eq!(cli.model, "claude-3-5-haiku-latest");
        assert_eq!(cli.timeout, std::time::Duration::from_secs(120));
    }

    #[test]
    fn unserved_model_rejected_before_any_turn() {
        let runtime = CliRuntime::with_backends(
            RuntimeConfig::default(),
            scripted("true").backends.clone(),
        );
        let specialist = Arc::new(agent_with("market_analyst", "", vec![]));
        let supervisor = build_agent(
            &AgentConfig {
                model: Some("sonnet".to_string()),
                ..Default::default()
            },
            vec![ToolHandle::Agent(specialist)],
        );
        let pipeline = Pipeline::Agent(Arc::new(supervisor));

        let err = runtime.check_pipeline(&pipeline).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'market_analyst' uses model 'gemini-2.5-pro'"), "{message}");
        assert!(message.contains("model_override"));
    }

    #[tokio::test]
    async fn cli_runtime_sends_rendered_instruction() {
        let runtime = scripted(r#"echo "$1|$3|$5""#);
        let agent = agent_with("analyst", "Focus on {symbol}.", vec![]);
        let mut state = Map::new();
        state.insert("symbol".to_string(), Value::String("ETHUSDT".to_string()));
        let output = runtime.run_agent(&agent, &input(state)).await.unwrap();
        assert_eq!(output, "-p|Focus on ETHUSDT.|sonnet");
    }

    #[tokio::test]
    async fn argv_carries_tool_server_allow_list() {
        let runtime = scripted(r#"printf '%s\n' "$@""#);
        let config = AgentConfig {
            name: Some("market_analyst".to_string()),
            tools: ToolsConfig {
                mcp_tool_filter: Some(vec!["get_tickers".to_string(), "get_kline".to_string()]),
                functions: vec![],
            },
            ..Default::default()
        };
        let agent = build_agent(&config, tools_for(&config).unwrap());

        let output = runtime.run_agent(&agent, &input(Map::new())).await.unwrap();
        let argv: Vec<&str> = output.lines().collect();
        let after = |flag: &str| argv[argv.iter().position(|a| *a == flag).unwrap() + 1];
        assert_eq!(after("--allowedTools"), "mcp__bybit__get_tickers,mcp__bybit__get_kline");
        let mcp: Value = serde_json::from_str(after("--mcp-config")).unwrap();
        assert_eq!(mcp["mcpServers"]["bybit"]["args"][0], "bybit-mcp==0.1.10");
    }

    const CALL_TIME_THEN_ECHO: &str = r###"input=$(cat)
case "$input" in
  *"## Tool result"*) printf 'final\n%s\n' "$input" ;;
  *) echo '{"tool": "get_current_time", "arguments": {"city": "Tokyo"}}' ;;
esac"###;

    #[tokio::test]
    async fn function_call_result_fed_back() {
        let runtime = scripted(CALL_TIME_THEN_ECHO);
        let agent = agent_with(
            "clock",
            "Tell the time.",
            vec![ToolHandle::Function(FunctionTool::GetCurrentTime)],
        );
        let output = runtime.run_agent(&agent, &input(Map::new())).await.unwrap();
        assert!(output.starts_with("final\nShould I add to BTC?"), "{output}");
        assert!(output.contains("## Tool result: get_current_time\n"));
        assert!(output.contains(r#""time":"03:30 PM""#), "{output}");
    }

    #[tokio::test]
    async fn ungranted_call_is_refused_in_band() {
        let runtime = scripted(CALL_TIME_THEN_ECHO);
        let agent = agent_with("no_clock", "", vec![]);
        let output = runtime.run_agent(&agent, &input(Map::new())).await.unwrap();
        assert!(output.contains("Tool 'get_current_time' is not available to agent 'no_clock'"));
    }

    #[tokio::test]
    async fn supervisor_reaches_sub_agent() {
        let runtime = scripted(
            r###"input=$(cat)
case "$3" in
  ANALYST*) echo "analyst: $input" ;;
  *) case "$input" in
       *"## Tool result"*) printf 'final\n%s\n' "$input" ;;
       *) echo '{"tool": "market_analyst", "arguments": {"request": "BTC trend?"}}' ;;
     esac ;;
esac"###,
        );
        let analyst = Arc::new(agent_with("market_analyst", "ANALYST", vec![]));
        let supervisor = agent_with("supervisor", "SUPERVISOR", vec![ToolHandle::Agent(analyst)]);

        let output = runtime.run_agent(&supervisor, &input(Map::new())).await.unwrap();
        assert!(output.starts_with("final"));
        assert!(output.contains(r#""output":"analyst: BTC trend?""#), "{output}");
    }

    #[tokio::test]
    async fn endless_tool_calls_stop() {
        let mut runtime =
            scripted(r#"echo '{"tool": "get_current_time", "arguments": {"city": "Tokyo"}}'"#);
        runtime.config.max_tool_rounds = 2;
        let agent = agent_with(
            "clock",
            "",
            vec![ToolHandle::Function(FunctionTool::GetCurrentTime)],
        );
        let err = runtime.run_agent(&agent, &input(Map::new())).await.unwrap_err();
        assert!(err.to_string().contains("exceeded 2 tool calls"));
    }
}
