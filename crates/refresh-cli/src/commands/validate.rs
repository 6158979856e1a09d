use clap::Args;

use refresh_core::config::RefreshConfig;
use refresh_core::source::load_records;
use refresh_core::store::DocumentStore;
use refresh_mongo::MongoStore;

use super::ConfigArgs;

#[derive(Args, Default)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

pub async fn execute(args: ValidateArgs) -> anyhow::Result<()> {
    let config = args.config.load()?;
    println!("Validating {}...", config.source_path.display());

    let errors = check(&config, &MongoStore::new());

    println!();
    if errors.is_empty() {
        println!("Validation PASSED");
    } else {
        println!("Validation FAILED with {} error(s):", errors.len());
        for err in &errors {
            eprintln!("  - {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Run every offline check and collect the problems found. Never connects.
fn check(config: &RefreshConfig, store: &dyn DocumentStore) -> Vec<String> {
    let mut errors = Vec::new();

    match config.validate() {
        Ok(()) => println!("  MONGO_URI: OK ({})", config.redacted_uri()),
        Err(e) => {
            println!("  MONGO_URI: MISSING");
            errors.push(e.to_string());
        }
    }

    for (var, value) in [
        ("DB_NAME", &config.database_name),
        ("COLLECTION_NAME", &config.collection_name),
    ] {
        if value.trim().is_empty() {
            println!("  {var}: MISSING");
            errors.push(format!("{var} is not set; the run would fail when connecting"));
        } else {
            println!("  {var}: {value}");
        }
    }
    println!("  Strategy: {}", config.strategy);

    match load_records(&config.source_path) {
        Ok(records) => {
            println!("  JSON parsing: OK");
            println!("  Records found: {}", records.len());
            if records.is_empty() {
                println!("  Note: source is empty; a run would leave the collection empty");
            }
            match store.check_records(&records) {
                Ok(()) => println!("  Record shape: OK"),
                Err(e) => {
                    println!("  Record shape: INVALID - {e}");
                    errors.push(e.to_string());
                }
            }
        }
        Err(e) => {
            println!("  JSON parsing: FAILED");
            errors.push(e.to_string());
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn config(uri: &str, source: &Path) -> RefreshConfig {
        RefreshConfig::from_lookup(|key| match key {
            "MONGO_URI" => Some(uri.to_string()),
            "DB_NAME" => Some("finance".into()),
            "COLLECTION_NAME" => Some("entries".into()),
            _ => None,
        })
        .unwrap()
        .with_source_path(source)
    }

    fn write_source(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn valid_setup_has_no_errors() {
        let file = write_source(r#"[{"a":1},{"a":2}]"#);
        let errors = check(&config("mongodb://localhost", file.path()), &MongoStore::new());
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn collects_every_problem() {
        let file = write_source(r#"[{"a":1}, 7]"#);
        let errors = check(&config("", file.path()), &MongoStore::new());
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].contains("MONGO_URI"));
        assert!(errors[1].contains("index 1"));
    }

    #[test]
    fn unreadable_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let errors = check(
            &config("mongodb://localhost", &dir.path().join("absent.json")),
            &MongoStore::new(),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("absent.json"));
    }
}
