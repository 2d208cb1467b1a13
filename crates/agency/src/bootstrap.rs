//! Process-wide start-up: tracing subscriber and trace export mode.
//!
//! Rust's standard streams already write UTF-8, so no stream encoding
//! setup is needed.

use std::sync::OnceLock;

use agency_models::ObservabilityConfig;
use tracing::Span;
use tracing_subscriber::EnvFilter;

pub const TRACE_KEY_VAR: &str = "AGENTOPS_API_KEY";

static TRACE_EXPORT: OnceLock<bool> = OnceLock::new();

/// Result of start-up. Run work inside `root_span` so every record
/// carries the trace name.
pub struct Bootstrap {
    pub trace_export: bool,
    pub root_span: Span,
}

/// True when a non-blank trace credential is present.
pub fn trace_export_enabled<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(TRACE_KEY_VAR).is_some_and(|key| !key.trim().is_empty())
}

/// Install the global subscriber. Only the first call in a process has an
/// effect; a missing trace credential disables export and is not an error.
pub fn init(config: &ObservabilityConfig) -> Bootstrap {
    let trace_export = *TRACE_EXPORT.get_or_init(|| {
        let enabled = trace_export_enabled(|name| std::env::var(name).ok());
        let builder = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr);
        // Another subscriber may already be installed (tests); keep it.
        let _ = if enabled {
            builder.json().with_current_span(true).try_init()
        } else {
            builder.try_init()
        };
        enabled
    });

    let root_span = if trace_export {
        tracing::info!(trace_name = %config.trace_name, "Trace export enabled");
        tracing::info_span!("trace", name = %config.trace_name)
    } else {
        tracing::debug!("{TRACE_KEY_VAR} not set; trace export skipped");
        Span::none()
    };

    Bootstrap {
        trace_export,
        root_span,
    }
}
