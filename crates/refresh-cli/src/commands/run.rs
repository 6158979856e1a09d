use std::sync::Arc;

use clap::Args;

use refresh_core::error::RefreshError;
use refresh_core::event::TracingEventSink;
use refresh_core::refresher::Refresher;
use refresh_mongo::MongoStore;

use super::ConfigArgs;

#[derive(Args, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Exit with status 1 when the refresh fails
    #[arg(long)]
    pub strict: bool,
    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let config = match args.config.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Refresh failed: {e}");
            return finish_failed(args.strict);
        }
    };

    tracing::debug!(?config, "Loaded configuration");

    let mut refresher = Refresher::new(config, Arc::new(MongoStore::new()));
    refresher.add_event_sink(Arc::new(TracingEventSink));

    match refresher.run().await {
        Ok(summary) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Refresh failed: {e}");
            if let Some(hint) = failure_hint(&e) {
                eprintln!("  {hint}");
            }
            finish_failed(args.strict)
        }
    }
}

/// Failures are logged, not propagated, unless `--strict` is set.
fn finish_failed(strict: bool) -> anyhow::Result<()> {
    if strict {
        std::process::exit(1);
    }
    Ok(())
}

fn failure_hint(err: &RefreshError) -> Option<&'static str> {
    match err {
        RefreshError::MissingConnectionString => {
            Some("Add MONGO_URI to .env or the environment; nothing was read or changed.")
        }
        RefreshError::SourceRead { .. } | RefreshError::Connection(_) => {
            Some("The remote collection was not modified.")
        }
        RefreshError::Clear(_) => Some("The collection may be partially cleared."),
        RefreshError::Insert(_) => Some(
            "Old documents may already be deleted; rerun once the cause is fixed, \
             or use --strategy staged.",
        ),
        RefreshError::Stage(_) => Some("The live collection was not modified."),
        RefreshError::Swap(_) => {
            Some("New data remains in the staging collection; the live collection was not renamed.")
        }
        RefreshError::Config(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_describe_remote_state() {
        let untouched = failure_hint(&RefreshError::Connection(anyhow::anyhow!("refused")));
        assert_eq!(untouched, Some("The remote collection was not modified."));

        let insert = failure_hint(&RefreshError::Insert(anyhow::anyhow!("dup key"))).unwrap();
        assert!(insert.contains("--strategy staged"));

        let staged = failure_hint(&RefreshError::Stage(anyhow::anyhow!("drop failed")));
        assert_eq!(staged, Some("The live collection was not modified."));

        assert!(failure_hint(&RefreshError::Config("bad".into())).is_none());
    }

    #[test]
    fn non_strict_failure_returns_ok() {
        assert!(finish_failed(false).is_ok());
    }
}
