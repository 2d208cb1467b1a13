pub mod bybit;
pub mod env;
pub mod error;
pub mod function;
pub mod mcp;
pub mod time;

pub use bybit::{BybitCli, BybitCliConfig};
pub use env::{build_external_credentials, build_external_credentials_from, get_env_var};
pub use error::ToolError;
pub use function::{FunctionTool, ToolBackends};
pub use mcp::{McpToolset, StdioServerParams};
pub use time::{current_time_for, HttpTimeApi, TimeApi};
