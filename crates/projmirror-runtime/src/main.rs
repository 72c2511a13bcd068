//! projmirror: replay daemon event logs through a project session.

use clap::Parser;

use projmirror_core::EngineConfig;
use projmirror_runtime::cli::{self, Command};
use projmirror_runtime::replay;
use projmirror_runtime::StaticTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("PROJMIRROR_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match args.command {
        Command::Replay(opts) => {
            let descriptor = replay::load_descriptor(&opts.project)?;
            let content = std::fs::read_to_string(&opts.events)?;
            let events = replay::parse_events(&content)?;
            let capabilities = match &opts.capabilities {
                Some(path) => replay::load_capabilities(path)?,
                None => replay::permissive_capabilities(),
            };
            tracing::info!(project_id = %descriptor.id, events = events.len(), "replaying");

            let transport = StaticTransport::new(capabilities, opts.metrics);
            let report =
                replay::replay(descriptor, events, transport, config, opts.changes).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
