pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::run::RunId;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log debug output from the pipeline
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct StageArgs {
    /// Pipeline configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: PathBuf,

    /// Run identifier; defaults to the current local time
    #[arg(short, long)]
    pub run_id: Option<RunId>,
}

#[derive(Args, Debug, Clone)]
pub struct ExistingRunArgs {
    /// Pipeline configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: PathBuf,

    /// Run to process
    #[arg(short, long)]
    pub run_id: RunId,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape, extract and post-process in one run
    Run(StageArgs),

    /// Capture career page snapshots
    Scrape(StageArgs),

    /// Send a run's snapshots through the language model
    Extract(ExistingRunArgs),

    /// Clean, deduplicate and publish a run's extracted records
    Post(ExistingRunArgs),

    /// Load and check a configuration file
    Validate {
        /// Pipeline configuration file
        #[arg(short, long, value_name = "PATH")]
        config: PathBuf,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => {
            let run_id = args.run_id.unwrap_or_else(RunId::generate);
            info!("Starting pipeline run {}", run_id);
            commands::run_all(&args.config, run_id).await
        }
        Commands::Scrape(args) => {
            let run_id = args.run_id.unwrap_or_else(RunId::generate);
            info!("Scraping into run {}", run_id);
            commands::scrape(&args.config, run_id).await
        }
        Commands::Extract(args) => {
            info!("Extracting run {}", args.run_id);
            commands::extract(&args.config, args.run_id).await
        }
        Commands::Post(args) => {
            info!("Post-processing run {}", args.run_id);
            commands::post(&args.config, args.run_id).await
        }
        Commands::Validate { config } => commands::validate(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert()
    }

    #[test]
    fn test_extract_requires_run_id() {
        assert!(Cli::try_parse_from(["careerscrape", "extract", "--config", "c.yaml"]).is_err());
        let cli = Cli::try_parse_from(["careerscrape", "extract", "-c", "c.yaml", "--run-id", "2024-05-01_10-00-00"]).unwrap();
        match cli.command {
            Commands::Extract(args) => assert_eq!(args.run_id.as_str(), "2024-05-01_10-00-00"),
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_unsafe_run_id_is_rejected() {
        assert!(Cli::try_parse_from(["careerscrape", "post", "-c", "c.yaml", "--run-id", "../other"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["careerscrape", "run", "-c", "c.yaml", "--verbose", "--log-file", "out.log"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_file, Some(PathBuf::from("out.log")));
        match cli.command {
            Commands::Run(args) => assert!(args.run_id.is_none()),
            _ => panic!("expected run"),
        }
    }
}
