use std::path::PathBuf;

use clap::{Args, Subcommand};

use refresh_core::config::{RefreshConfig, RefreshStrategy};

pub mod run;
pub mod validate;

#[derive(Subcommand)]
pub enum Commands {
    /// Replace the collection with the source file (default)
    Run(run::RunArgs),
    /// Check configuration and source file without connecting
    Validate(validate::ValidateArgs),
}

/// Overrides layered on top of the environment.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Path to the JSON source file (overrides SOURCE_PATH)
    #[arg(long)]
    pub source: Option<PathBuf>,
    /// Refresh strategy: replace or staged (overrides REFRESH_STRATEGY)
    #[arg(long)]
    pub strategy: Option<RefreshStrategy>,
}

impl ConfigArgs {
    pub fn load(&self) -> anyhow::Result<RefreshConfig> {
        Ok(self.apply(RefreshConfig::from_env()?))
    }

    pub fn apply(&self, mut config: RefreshConfig) -> RefreshConfig {
        if let Some(source) = &self.source {
            config = config.with_source_path(source);
        }
        if let Some(strategy) = self.strategy {
            config = config.with_strategy(strategy);
        }
        config
    }
}
