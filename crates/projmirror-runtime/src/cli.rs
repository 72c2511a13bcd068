//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "projmirror", about = "Mirror a remote project's state from daemon events")]
pub struct Cli {
    /// Engine config file (TOML). Defaults apply when omitted.
    #[arg(long, short = 'c', global = true, env = "PROJMIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Feed a recorded event stream through a project session
    Replay(ReplayOpts),
    /// Validate a config file and print the effective settings
    CheckConfig,
}

#[derive(clap::Args)]
pub struct ReplayOpts {
    /// Project descriptor (JSON)
    #[arg(long)]
    pub project: PathBuf,

    /// Daemon events, one JSON object per line
    #[arg(long)]
    pub events: PathBuf,

    /// Capabilities payload returned by the stub transport (JSON)
    #[arg(long)]
    pub capabilities: Option<PathBuf>,

    /// Answer metrics probes with "available"
    #[arg(long)]
    pub metrics: bool,

    /// Print every change notification as a JSON line
    #[arg(long)]
    pub changes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replay_args() {
        let cli = Cli::try_parse_from([
            "projmirror",
            "replay",
            "--project",
            "p.json",
            "--events",
            "e.jsonl",
            "--metrics",
        ])
        .unwrap();
        match cli.command {
            Command::Replay(opts) => {
                assert_eq!(opts.project, PathBuf::from("p.json"));
                assert!(opts.metrics);
                assert!(opts.capabilities.is_none());
            }
            Command::CheckConfig => panic!("expected replay"),
        }
    }

    #[test]
    fn replay_requires_events() {
        assert!(Cli::try_parse_from(["projmirror", "replay", "--project", "p.json"]).is_err());
    }
}
