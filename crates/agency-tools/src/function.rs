use std::sync::Arc;

use agency_models::ToolOutcome;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::bybit::{BybitCli, DEFAULT_SYMBOL};
use crate::error::ToolError;
use crate::time::{get_current_time, TimeApi};

/// Built-in tools an agent document can list under `tools.functions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionTool {
    GetCurrentTime,
    GetCurrentTimeSimple,
    GetBybitMarketData,
    GetBybitPrice,
}

/// Backends the built-in tools call into.
#[derive(Clone)]
pub struct ToolBackends {
    pub time: Arc<dyn TimeApi>,
    pub bybit: BybitCli,
}

impl FunctionTool {
    pub const ALL: [FunctionTool; 4] = [
        FunctionTool::GetCurrentTime,
        FunctionTool::GetCurrentTimeSimple,
        FunctionTool::GetBybitMarketData,
        FunctionTool::GetBybitPrice,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FunctionTool::GetCurrentTime => "get_current_time",
            FunctionTool::GetCurrentTimeSimple => "get_current_time_simple",
            FunctionTool::GetBybitMarketData => "get_bybit_market_data",
            FunctionTool::GetBybitPrice => "get_bybit_price",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ToolError> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| ToolError::UnknownFunction(name.to_string()))
    }

    pub fn description(&self) -> &'static str {
        match self {
            FunctionTool::GetCurrentTime | FunctionTool::GetCurrentTimeSimple => {
                "Returns the current time in a specified city."
            }
            FunctionTool::GetBybitMarketData => "Get market data from Bybit for a trading pair.",
            FunctionTool::GetBybitPrice => "Get current price for a trading pair from Bybit.",
        }
    }

    /// JSON shape of the arguments `call` expects.
    pub fn argument_hint(&self) -> &'static str {
        match self {
            FunctionTool::GetCurrentTime | FunctionTool::GetCurrentTimeSimple => {
                r#"{"city": "<city name>"}"#
            }
            FunctionTool::GetBybitMarketData | FunctionTool::GetBybitPrice => {
                r#"{"symbol": "<pair, default BTCUSDT>"}"#
            }
        }
    }

    /// Invoke the tool with JSON arguments. Always returns a status-tagged
    /// JSON object, never an error.
    pub async fn call(&self, backends: &ToolBackends, args: &Value) -> Value {
        debug!(tool = self.name(), "Calling function tool");
        match self {
            FunctionTool::GetCurrentTime | FunctionTool::GetCurrentTimeSimple => {
                match string_arg(args, "city") {
                    Some(city) => to_json(get_current_time(backends.time.as_ref(), &city).await),
                    None => missing_arg("city"),
                }
            }
            FunctionTool::GetBybitMarketData => {
                let symbol = string_arg(args, "symbol").unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
                to_json(backends.bybit.get_market_data(&symbol).await)
            }
            FunctionTool::GetBybitPrice => {
                let symbol = string_arg(args, "symbol").unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
                to_json(backends.bybit.get_price(&symbol).await)
            }
        }
    }
}

fn string_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn missing_arg(key: &str) -> Value {
    to_json(ToolOutcome::<()>::error(
        ToolError::InvalidArguments(format!("missing '{key}'")).to_string(),
    ))
}

fn to_json<T: Serialize>(outcome: ToolOutcome<T>) -> Value {
    serde_json::to_value(&outcome).unwrap_or_else(|e| {
        serde_json::json!({"status": "error", "message": format!("Unserializable tool result: {e}")})
    })
}
