//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the clipforge-core domain logic through `AppState`.

pub mod agents;
pub mod create;
pub mod plan;
pub mod server;
pub mod workflow;

use std::collections::BTreeMap;
use std::sync::Arc;

use clipforge_core::state::AppState;
use clipforge_core::AppConfig;

/// Initialize a shared `AppState` from the given SQLite database path and
/// optional config file.
///
/// This mirrors `clipforge_server::create_app_state` but exits the process
/// with a readable message instead of returning the error.
pub async fn init_state(db_path: &str, config_path: Option<&str>) -> AppState {
    let config = AppConfig::load(config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {}", e);
        std::process::exit(1);
    });

    let db = clipforge_core::Database::open(db_path).unwrap_or_else(|e| {
        eprintln!("Failed to open database '{}': {}", db_path, e);
        std::process::exit(1);
    });

    Arc::new(clipforge_core::AppStateInner::new(db, config))
}

/// Parse repeated `key=value` flags. Values that are valid JSON keep their
/// type (`duration_secs=15` is a number); anything else is a string.
pub fn parse_params(raw: &[String]) -> Result<BTreeMap<String, serde_json::Value>, String> {
    let mut params = BTreeMap::new();
    for item in raw {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| format!("Invalid parameter '{}': expected key=value", item))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid parameter '{}': empty key", item));
        }
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
