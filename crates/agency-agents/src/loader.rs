use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use agency_models::AgentConfig;
use agency_tools::FunctionTool;
use tracing::debug;

use crate::error::AgentError;

pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Reads agent documents from a fixed configuration directory.
///
/// Nothing is cached: every call re-reads the file.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    dir: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_DIR)
    }
}

impl ConfigLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load and validate `file_name` from the configuration directory.
    ///
    /// A document that is not a mapping (empty file, list, scalar) yields an
    /// empty config.
    pub fn load(&self, file_name: &str) -> Result<AgentConfig, AgentError> {
        let path = self.dir.join(file_name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AgentError::ConfigNotFound(path))
            }
            Err(e) => return Err(e.into()),
        };

        let parse_error = |e: serde_yaml::Error| AgentError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        };

        let document: serde_yaml::Value = serde_yaml::from_str(&text).map_err(parse_error)?;
        if !document.is_mapping() {
            debug!(path = %path.display(), "Agent config is not a mapping, using empty config");
            return Ok(AgentConfig::default());
        }

        let config: AgentConfig = serde_yaml::from_value(document).map_err(parse_error)?;
        validate(&config).map_err(|e| match e {
            AgentError::InvalidConfig(msg) => {
                AgentError::InvalidConfig(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;

        debug!(path = %path.display(), name = ?config.name, "Loaded agent config");
        Ok(config)
    }

    /// Load `file_name` and default a missing name to the file stem.
    pub fn load_named(&self, file_name: &str) -> Result<AgentConfig, AgentError> {
        let mut config = self.load(file_name)?;
        if config.name.is_none() {
            config.name = Some(name_from_file(file_name));
        }
        Ok(config)
    }
}

/// `market_analyst.yaml` -> `market_analyst`
pub fn name_from_file(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

/// Agent names and output keys must be identifiers; function tools must be
/// built-ins.
pub fn validate(config: &AgentConfig) -> Result<(), AgentError> {
    if let Some(name) = &config.name {
        if !is_identifier(name) {
            return Err(AgentError::InvalidConfig(format!(
                "agent name '{name}' must be an identifier"
            )));
        }
    }
    if let Some(key) = &config.output_key {
        if !is_identifier(key) {
            return Err(AgentError::InvalidConfig(format!(
                "output_key '{key}' must be an identifier"
            )));
        }
    }
    for function in &config.tools.functions {
        FunctionTool::from_name(function)
            .map_err(|e| AgentError::InvalidConfig(e.to_string()))?;
    }
    Ok(())
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
