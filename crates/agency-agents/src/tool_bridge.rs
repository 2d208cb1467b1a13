//! Exposes an agent's tool handles to a command-line model client.
//!
//! Tool server handles become client flags: an MCP configuration naming the
//! server and an allow-list of qualified operation names. Built-in functions
//! and sub-agents are offered in the system prompt and called back through a
//! JSON reply the runtime recognizes.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::agent::{Agent, ToolHandle};
use crate::error::AgentError;

pub const MCP_SERVER_NAME: &str = "bybit";

/// Client flags and environment for an agent's tool server handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientTools {
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Flags granting the agent its tool servers, restricted to their
/// allow-lists. A handle with an empty allow-list grants nothing and is
/// left out.
pub fn client_tools(agent: &Agent) -> Result<ClientTools, AgentError> {
    let mut servers = Map::new();
    let mut allowed = Vec::new();
    let mut env = BTreeMap::new();

    let toolsets = agent.tools.iter().filter_map(|tool| match tool {
        ToolHandle::Mcp(toolset) if !toolset.tool_filter.is_empty() => Some(toolset),
        _ => None,
    });
    for (i, toolset) in toolsets.enumerate() {
        let server = match i {
            0 => MCP_SERVER_NAME.to_string(),
            n => format!("{MCP_SERVER_NAME}_{n}"),
        };
        allowed.extend(toolset.qualified_tools(&server));
        servers.insert(server, toolset.server_entry());
        env.extend(toolset.connection.env.clone());
    }

    if servers.is_empty() {
        return Ok(ClientTools::default());
    }

    let config = serde_json::to_string(&json!({ "mcpServers": servers }))?;
    Ok(ClientTools {
        args: vec![
            "--mcp-config".to_string(),
            config,
            "--strict-mcp-config".to_string(),
            "--allowedTools".to_string(),
            allowed.join(","),
        ],
        env,
    })
}

/// System prompt section describing the functions and sub-agents the agent
/// may call, or `None` when it has neither.
pub fn callable_tools_section(agent: &Agent) -> Option<String> {
    let entries: Vec<String> = agent
        .tools
        .iter()
        .filter_map(|tool| match tool {
            ToolHandle::Function(function) => Some(format!(
                "- {}: {} Arguments: {}",
                function.name(),
                function.description(),
                function.argument_hint()
            )),
            ToolHandle::Agent(sub) => Some(format!(
                "- {} (agent): {} Arguments: {{\"request\": \"<what to ask>\"}}",
                sub.name, sub.description
            )),
            ToolHandle::Mcp(_) => None,
        })
        .collect();

    if entries.is_empty() {
        return None;
    }
    Some(format!(
        "## Callable tools\n\
         To call one of these, reply with only a JSON object \
         {{\"tool\": \"<name>\", \"arguments\": {{...}}}}. The result comes back \
         in the next message; answer normally once you have what you need.\n\n{}",
        entries.join("\n")
    ))
}

/// A reply asking the runtime to run a function or sub-agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

/// The whole reply, optionally inside a markdown code block, must be the
/// call object. Anything else is a final answer.
pub fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);
    if !body.starts_with('{') {
        return None;
    }
    serde_json::from_str(body).ok()
}

/// The handle that grants `call`, if any. Tool server operations are the
/// client's business and never match here.
pub fn resolve_call<'a>(agent: &'a Agent, call: &ToolCall) -> Option<&'a ToolHandle> {
    agent.tools.iter().find(|tool| {
        matches!(tool, ToolHandle::Function(_) | ToolHandle::Agent(_)) && tool.allows(&call.tool)
    })
}

/// Request text handed to a sub-agent.
pub fn sub_agent_request(call: &ToolCall) -> String {
    call.arguments
        .get("request")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| call.arguments.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agent::{build_agent, tools_for};
    use agency_models::{AgentConfig, ToolsConfig};
    use agency_tools::{FunctionTool, McpToolset, StdioServerParams};

    fn analyst() -> Agent {
        let config = AgentConfig {
            name: Some("market_analyst".to_string()),
            description: Some("Reads the market.".to_string()),
            tools: ToolsConfig {
                mcp_tool_filter: Some(vec!["get_tickers".to_string(), "get_kline".to_string()]),
                functions: vec!["get_current_time".to_string()],
            },
            ..Default::default()
        };
        build_agent(&config, tools_for(&config).unwrap())
    }

    fn flag<'a>(tools: &'a ClientTools, name: &str) -> &'a str {
        let at = tools.args.iter().position(|a| a == name).unwrap();
        &tools.args[at + 1]
    }

    #[test]
    fn allow_list_becomes_client_flags() {
        let tools = client_tools(&analyst()).unwrap();
        assert_eq!(
            flag(&tools, "--allowedTools"),
            "mcp__bybit__get_tickers,mcp__bybit__get_kline"
        );
        assert!(tools.args.contains(&"--strict-mcp-config".to_string()));

        let config: Value = serde_json::from_str(flag(&tools, "--mcp-config")).unwrap();
        let server = &config["mcpServers"]["bybit"];
        assert_eq!(server["command"], "uvx");
        assert_eq!(server["args"], json!(["bybit-mcp==0.1.10"]));
        assert!(tools.env.contains_key("BYBIT_TESTNET"));
    }

    #[test]
    fn credentials_stay_off_the_command_line() {
        let env: BTreeMap<String, String> = [
            ("BYBIT_API_KEY", "key-123"),
            ("BYBIT_API_SECRET", "secret-456"),
            ("BYBIT_TESTNET", "true"),
            ("BYBIT_TRADING_ENABLED", "false"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let toolset = McpToolset::new(StdioServerParams::bybit(env), Some(["get_positions"]));
        let agent = build_agent(&AgentConfig::default(), vec![ToolHandle::Mcp(toolset)]);

        let tools = client_tools(&agent).unwrap();
        assert!(tools.args.iter().all(|a| !a.contains("key-123") && !a.contains("secret-456")));
        assert_eq!(tools.env["BYBIT_API_KEY"], "key-123");
        assert_eq!(tools.env["BYBIT_API_SECRET"], "secret-456");
    }

    #[test]
    fn empty_or_absent_allow_list_grants_no_server() {
        let empty = McpToolset::new(StdioServerParams::bybit(BTreeMap::new()), Some(Vec::<String>::new()));
        let agent = build_agent(&AgentConfig::default(), vec![ToolHandle::Mcp(empty)]);
        assert_eq!(client_tools(&agent).unwrap(), ClientTools::default());
        let bare = build_agent(&AgentConfig::default(), vec![]);
        assert_eq!(client_tools(&bare).unwrap(), ClientTools::default());
    }

    #[test]
    fn section_lists_functions_and_sub_agents() {
        let boss = build_agent(
            &AgentConfig::default(),
            vec![
                ToolHandle::Function(FunctionTool::GetBybitPrice),
                ToolHandle::Agent(Arc::new(analyst())),
            ],
        );
        let section = callable_tools_section(&boss).unwrap();
        assert!(section.starts_with("## Callable tools\n"));
        assert!(section.contains("- get_bybit_price: Get current price"));
        assert!(section.contains("- market_analyst (agent): Reads the market."));
        assert!(callable_tools_section(&build_agent(&AgentConfig::default(), vec![])).is_none());
    }

    #[test]
    fn tool_call_replies() {
        let call = parse_tool_call(r#" {"tool": "get_current_time", "arguments": {"city": "Tokyo"}} "#)
            .unwrap();
        assert_eq!(call.tool, "get_current_time");
        assert_eq!(call.arguments["city"], "Tokyo");

        let fenced = "```json\n{\"tool\": \"market_analyst\"}\n```";
        assert_eq!(parse_tool_call(fenced).unwrap().arguments, Value::Null);

        assert!(parse_tool_call("Hold BTC. {\"tool\": \"x\"}").is_none());
        assert!(parse_tool_call(r#"{"signal": "hold"}"#).is_none());
        assert!(parse_tool_call(r#"{"tool": "x", "extra": 1}"#).is_none());
    }

    #[test]
    fn only_functions_and_agents_resolve() {
        let agent = analyst();
        let call = |tool: &str| ToolCall {
            tool: tool.to_string(),
            arguments: Value::Null,
        };
        assert!(matches!(
            resolve_call(&agent, &call("get_current_time")),
            Some(ToolHandle::Function(FunctionTool::GetCurrentTime))
        ));
        assert!(resolve_call(&agent, &call("get_tickers")).is_none());
        assert!(resolve_call(&agent, &call("place_order")).is_none());
    }

    #[test]
    fn sub_agent_request_text() {
        let call = ToolCall {
            tool: "market_analyst".to_string(),
            arguments: json!({"request": "BTC trend?"}),
        };
        assert_eq!(sub_agent_request(&call), "BTC trend?");
        let call = ToolCall {
            tool: "market_analyst".to_string(),
            arguments: json!({"symbol": "ETHUSDT"}),
        };
        assert_eq!(sub_agent_request(&call), r#"{"symbol":"ETHUSDT"}"#);
    }
}
