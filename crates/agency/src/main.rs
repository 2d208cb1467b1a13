use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Instrument;

#[derive(Parser, Debug)]
#[command(name = "agency", about = "Configuration-driven crypto market agents")]
struct Cli {
    /// Path to the top-level configuration file
    #[arg(short, long, default_value = "config/agency.toml")]
    config: PathBuf,

    /// Directory holding the per-agent YAML documents
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Session id; reuse it to continue a conversation
    #[arg(short, long)]
    session: Option<String>,

    /// Print the composed pipeline as JSON and exit
    #[arg(long)]
    describe: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Message for the agents; read from stdin when omitted
    message: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a local .env file.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = agency::load_config(&cli.config)?;
    let boot = agency::bootstrap::init(&config.observability);

    run(cli, config).instrument(boot.root_span).await
}

async fn run(cli: Cli, config: agency::models::AgencyConfig) -> Result<()> {
    let pipeline = agency::build_pipeline(&config, &cli.config_dir)
        .with_context(|| format!("Failed to build pipeline from {}", cli.config_dir.display()))?;

    if cli.describe {
        return print_json(&pipeline.describe(), cli.pretty);
    }

    let message = match cli.message {
        Some(message) => message,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            buf
        }
    };
    let message = message.trim();
    anyhow::ensure!(!message.is_empty(), "No message given");

    let session_id = cli
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let executor = agency::build_executor(&config, &pipeline)
        .context("Agent runtime is not usable with this configuration")?;
    let report = executor
        .run(&pipeline, &session_id, message)
        .await
        .map_err(|e| anyhow::anyhow!("Pipeline run failed: {e}"))?;

    print_json(&report, cli.pretty)
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
