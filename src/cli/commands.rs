//! CLI command implementations
//!
//! Each command returns the `data` payload of its response; `run_command`
//! writes it to stdout. Logs never go to stdout.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use serde_json::{json, Value};

use crate::config::StoreConfig;
use crate::lock;
use crate::observability::{Logger, Severity, Timer};
use crate::query::{Operator, Query};
use crate::store::Store;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_document, read_documents, write_error, write_response};

/// Parse arguments, run the command and report the outcome
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();

    if cli.verbose {
        Logger::set_min_severity(Severity::Info);
    }

    match run_command(cli.command, cli.config.as_deref()) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command, config: Option<&Path>) -> CliResult<Value> {
    match cmd {
        Command::Init { store } => init(&store_config(config, &store)?),
        Command::Query {
            store,
            field,
            value,
            operator,
            raw,
        } => {
            let query = Query::new(field, parse_value(&value, raw), Operator::parse(&operator));
            query_store(&store_config(config, &store)?, &query)
        }
        Command::Ingest {
            store,
            input,
            filter_field,
            filter_value,
            filter_operator,
        } => {
            let filter = match (filter_field, filter_value) {
                (Some(field), Some(value)) => Some(Query::new(
                    field,
                    parse_value(&value, false),
                    Operator::parse(&filter_operator),
                )),
                _ => None,
            };
            ingest(&store_config(config, &store)?, &input, filter.as_ref())
        }
        Command::Append { store } => append(&store_config(config, &store)?, io::stdin().lock()),
        Command::Unlock { store } => unlock(&store),
    }
}

/// Build the store configuration: from the config file when given, with
/// the command's store path taking precedence.
pub fn store_config(config_path: Option<&Path>, store: &Path) -> CliResult<StoreConfig> {
    let mut config = match config_path {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::new(store),
    };
    config.path = store.to_path_buf();
    config.validate()?;
    Ok(config)
}

/// Query values are JSON when they parse as JSON, strings otherwise
pub fn parse_value(raw_value: &str, force_string: bool) -> Value {
    if force_string {
        return Value::String(raw_value.to_string());
    }
    serde_json::from_str(raw_value).unwrap_or_else(|_| Value::String(raw_value.to_string()))
}

/// Create the store file if absent
pub fn init(config: &StoreConfig) -> CliResult<Value> {
    let existed = config.path.exists();
    Store::open_with(config.clone())?;

    Ok(json!({
        "path": config.path.display().to_string(),
        "created": !existed,
    }))
}

/// Print the documents matching `query`
pub fn query_store(config: &StoreConfig, query: &Query) -> CliResult<Value> {
    let mut store = Store::open_with(config.clone())?;
    let documents = store.find(query)?;
    Ok(Value::Array(documents))
}

/// Bulk load: add every input document in memory, then one save
pub fn ingest(config: &StoreConfig, input: &Path, filter: Option<&Query>) -> CliResult<Value> {
    let timer = Timer::new();
    let file = File::open(input).map_err(|e| {
        CliError::io_error(format!("Failed to open input {}: {}", input.display(), e))
    })?;

    let mut store = Store::open_with(config.clone())?;
    let mut read = 0usize;
    let mut added = 0usize;

    for document in read_documents(BufReader::new(file)) {
        let document = document?;
        read += 1;
        if filter.map_or(true, |q| q.matches(&document)) {
            store.add(document)?;
            added += 1;
        }
    }

    store.save()?;

    Ok(json!({
        "read": read,
        "added": added,
        "documents": store.documents()?.len(),
        "elapsed_ms": timer.elapsed().as_millis() as u64,
    }))
}

/// Durably append one document read from `input`
pub fn append(config: &StoreConfig, input: impl io::Read) -> CliResult<Value> {
    let document = read_document(input)?;
    let mut store = Store::open_with(config.clone())?;
    store.append(document)?;

    Ok(json!({
        "documents": store.documents()?.len(),
    }))
}

/// Remove the lock marker of `store`, reporting who held it
pub fn unlock(store: &Path) -> CliResult<Value> {
    // An unreadable marker still gets removed
    let holder = lock::holder(store).ok().flatten();
    let removed = lock::force_release(store)?;

    Ok(json!({
        "marker": lock::marker_path(store).display().to_string(),
        "removed": removed,
        "holder": holder,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn setup() -> (TempDir, StoreConfig) {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path().join("addresses.sds"));
        (temp_dir, config)
    }

    #[test]
    fn test_init_creates_file() {
        let (_tmp, config) = setup();

        let data = init(&config).unwrap();
        assert_eq!(data["created"], true);
        assert!(config.path.exists());

        let data = init(&config).unwrap();
        assert_eq!(data["created"], false);
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("75016", false), json!(75016));
        assert_eq!(parse_value("75016", true), json!("75016"));
        assert_eq!(parse_value("Rue de la Paix", false), json!("Rue de la Paix"));
        assert_eq!(parse_value("\"quoted\"", false), json!("quoted"));
    }

    #[test]
    fn test_ingest_then_query() {
        let (tmp, config) = setup();
        let input = tmp.path().join("input.ndjson");
        fs::write(
            &input,
            concat!(
                "{\"street\":\"Place Victor Hugo\",\"city\":\"Paris\"}\n",
                "{\"street\":\"Rue de la Paix\",\"city\":\"Paris\"}\n",
                "\n",
                "{\"street\":\"Place Bellecour\",\"city\":\"Lyon\"}\n",
            ),
        )
        .unwrap();

        let report = ingest(&config, &input, None).unwrap();
        assert_eq!(report["read"], 3);
        assert_eq!(report["added"], 3);

        let found = query_store(&config, &Query::starts_with("street", "Place")).unwrap();
        assert_eq!(found.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_ingest_with_filter() {
        let (tmp, config) = setup();
        let input = tmp.path().join("input.ndjson");
        fs::write(
            &input,
            "{\"city\":\"Paris\"}\n{\"city\":\"Lyon\"}\n{\"city\":\"Paris\"}\n",
        )
        .unwrap();

        let filter = Query::equals("city", "Paris");
        let report = ingest(&config, &input, Some(&filter)).unwrap();
        assert_eq!(report["read"], 3);
        assert_eq!(report["added"], 2);
        assert_eq!(report["documents"], 2);
    }

    #[test]
    fn test_ingest_bad_line_writes_nothing() {
        let (tmp, config) = setup();
        let input = tmp.path().join("input.ndjson");
        fs::write(&input, "{\"city\":\"Paris\"}\n{oops\n").unwrap();

        let err = ingest(&config, &input, None).unwrap_err();
        assert_eq!(err.code_str(), "SDS_CLI_INVALID_INPUT");

        let found = query_store(&config, &Query::equals("city", "Paris")).unwrap();
        assert!(found.as_array().unwrap().is_empty());
    }

    #[test]
    fn test_append_from_reader() {
        let (_tmp, config) = setup();

        append(&config, Cursor::new("{\"n\":1}")).unwrap();
        let data = append(&config, Cursor::new("{\"n\":2}")).unwrap();
        assert_eq!(data["documents"], 2);
    }

    #[test]
    fn test_append_rejects_invalid_json() {
        let (_tmp, config) = setup();
        let err = append(&config, Cursor::new("not json")).unwrap_err();
        assert_eq!(err.code_str(), "SDS_CLI_INVALID_INPUT");
    }

    #[test]
    fn test_unlock_removes_orphaned_marker() {
        let (_tmp, config) = setup();
        init(&config).unwrap();

        let handle = lock::acquire(&config.path).unwrap();
        std::mem::forget(handle);

        let data = unlock(&config.path).unwrap();
        assert_eq!(data["removed"], true);
        assert!(data["holder"]["pid"].is_number());

        let data = unlock(&config.path).unwrap();
        assert_eq!(data["removed"], false);
        assert!(data["holder"].is_null());
    }

    #[test]
    fn test_store_config_path_overrides_file() {
        let (tmp, _) = setup();
        let config_path = tmp.path().join("sdstore.json");
        fs::write(
            &config_path,
            json!({"path": "elsewhere.sds", "lock_retries": 2}).to_string(),
        )
        .unwrap();

        let store = tmp.path().join("db.sds");
        let config = store_config(Some(&config_path), &store).unwrap();
        assert_eq!(config.path, store);
        assert_eq!(config.lock_retries, 2);
    }
}
