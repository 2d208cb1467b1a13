pub mod agent;
pub mod assembly;
pub mod composer;
pub mod error;
pub mod executor;
pub mod instruction;
pub mod loader;
pub mod model_cli;
pub mod runtime;
pub mod services;
pub mod tool_bridge;

pub mod test_support;

pub use agent::{build_agent, build_single_agent, tools_for, Agent, ToolHandle};
pub use assembly::assemble;
pub use composer::{compose, Pipeline, PipelineDescription};
pub use error::AgentError;
pub use executor::{AgentRunReport, PipelineExecutor, RunReport};
pub use loader::ConfigLoader;
pub use runtime::{AgentInput, AgentRuntime, CliRuntime};
pub use services::{MemoryService, Services, SessionService};
