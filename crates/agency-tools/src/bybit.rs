use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::str::FromStr;
use std::time::Duration;

use agency_models::{MarketData, PriceReport, ToolOutcome};
use rust_decimal::Decimal;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::env::{build_external_credentials, has_credentials};
use crate::error::ToolError;

pub const DEFAULT_SYMBOL: &str = "BTCUSDT";

/// Configuration for the command-line market-data tool.
#[derive(Debug, Clone)]
pub struct BybitCliConfig {
    pub program: String,
    /// Arguments placed before `get_tickers --symbol <SYMBOL>`.
    pub prefix_args: Vec<String>,
    pub timeout: Duration,
}

impl Default for BybitCliConfig {
    fn default() -> Self {
        Self {
            program: "uvx".to_string(),
            prefix_args: vec!["bybit-mcp".to_string()],
            timeout: Duration::from_secs(30),
        }
    }
}

/// Direct subprocess path to Bybit ticker data.
#[derive(Debug, Clone, Default)]
pub struct BybitCli {
    pub config: BybitCliConfig,
}

/// How a failed invocation is worded for each caller.
struct Wording<'a> {
    exit_failure: &'a str,
    parse_failure: &'a str,
}

impl BybitCli {
    pub fn new(config: BybitCliConfig) -> Self {
        Self { config }
    }

    /// Ticker payload for `symbol`, credentials read from the process
    /// environment.
    pub async fn get_market_data(&self, symbol: &str) -> ToolOutcome<MarketData> {
        self.market_data(symbol, &build_external_credentials())
            .await
            .into()
    }

    /// Last price for `symbol`, credentials read from the process environment.
    pub async fn get_price(&self, symbol: &str) -> ToolOutcome<PriceReport> {
        self.price(symbol, &build_external_credentials())
            .await
            .into()
    }

    pub async fn market_data(
        &self,
        symbol: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<MarketData, ToolError> {
        let wording = Wording {
            exit_failure: "Bybit MCP command failed",
            parse_failure: "Failed to parse response",
        };
        let data = self.run_tickers(symbol, env, &wording).await?;
        Ok(MarketData {
            symbol: symbol.to_string(),
            data,
        })
    }

    pub async fn price(
        &self,
        symbol: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<PriceReport, ToolError> {
        let exit_failure = format!("Failed to get price for {symbol}");
        let wording = Wording {
            exit_failure: &exit_failure,
            parse_failure: "Failed to parse price response",
        };
        let data = self.run_tickers(symbol, env, &wording).await?;
        extract_price(symbol, &data)
    }

    async fn run_tickers(
        &self,
        symbol: &str,
        env: &BTreeMap<String, String>,
        wording: &Wording<'_>,
    ) -> Result<serde_json::Value, ToolError> {
        if !has_credentials(env) {
            return Err(ToolError::CredentialsMissing);
        }

        debug!(program = %self.config.program, symbol, "Invoking market-data tool");

        let output = tokio::time::timeout(self.config.timeout, async {
            Command::new(&self.config.program)
                .args(&self.config.prefix_args)
                .args(["get_tickers", "--symbol", symbol])
                .envs(env)
                .kill_on_drop(true)
                .output()
                .await
        })
        .await
        .map_err(|_| {
            ToolError::Timeout("Bybit MCP request".to_string(), self.config.timeout)
        })?
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ToolError::ExternalToolFailure(format!(
                "{} not found. Please install uv first.",
                self.config.program
            )),
            _ => ToolError::ExternalToolFailure(format!("Error calling Bybit MCP: {e}")),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr, "Market-data tool failed");
            return Err(ToolError::ExternalToolFailure(format!(
                "{}: {}",
                wording.exit_failure, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(&stdout).map_err(|_| {
            ToolError::ExternalToolFailure(format!("{}: {}", wording.parse_failure, stdout))
        })
    }
}

/// Pull the first ticker out of a `get_tickers` payload.
pub fn extract_price(symbol: &str, data: &serde_json::Value) -> Result<PriceReport, ToolError> {
    let ticker = data
        .get("result")
        .and_then(|r| r.get("list"))
        .and_then(|l| l.as_array())
        .and_then(|l| l.first())
        .ok_or_else(|| ToolError::ExternalToolFailure(format!("No price data found for {symbol}")))?;

    let price = match ticker.get("lastPrice") {
        Some(serde_json::Value::String(s)) => Decimal::from_str(s).ok(),
        Some(serde_json::Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };

    Ok(PriceReport {
        symbol: symbol.to_string(),
        price,
        data: ticker.clone(),
    })
}
