use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "mongo-refresh",
    about = "Replace a MongoDB collection with the contents of a local JSON file",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<commands::Commands>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true, env = "REFRESH_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
            tracing::debug!(path = %path.display(), "Loaded environment file");
        }
        None => {
            if let Ok(path) = dotenvy::dotenv() {
                tracing::debug!(path = %path.display(), "Loaded environment file");
            }
        }
    }

    match cli.command {
        None => commands::run::execute(commands::run::RunArgs::default()).await,
        Some(commands::Commands::Run(args)) => commands::run::execute(args).await,
        Some(commands::Commands::Validate(args)) => commands::validate::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use refresh_core::config::RefreshStrategy;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_runs_with_defaults() {
        let cli = Cli::try_parse_from(["mongo-refresh"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "mongo-refresh",
            "-vv",
            "run",
            "--source",
            "data/entries.json",
            "--strategy",
            "staged",
            "--strict",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(commands::Commands::Run(args)) => {
                assert_eq!(args.config.source, Some(PathBuf::from("data/entries.json")));
                assert_eq!(args.config.strategy, Some(RefreshStrategy::Staged));
                assert!(args.strict);
                assert!(args.json);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn unknown_strategy_is_a_usage_error() {
        let result = Cli::try_parse_from(["mongo-refresh", "run", "--strategy", "upsert"]);
        assert!(result.is_err());
    }
}
