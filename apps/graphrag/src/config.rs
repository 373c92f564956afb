//! # Configuration Loading
//!
//! Pretraining configuration is a TOML file layered under dotted
//! `--set section.key=value` overrides. Overrides are applied to the TOML
//! tree before it is deserialised, so they go through the same validation as
//! file values.

use graphrag_core::{GraphragError, PretrainConfig};
use std::path::Path;
use toml::{Table, Value};

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Parse an override value as a TOML literal, falling back to a string.
///
/// `42` becomes an integer, `[1, 2]` an array, `adam` the string `"adam"`.
pub fn parse_override_value(raw: &str) -> Value {
    let wrapped = format!("value = {}", raw);
    match wrapped.parse::<Table>() {
        Ok(mut table) => table
            .remove("value")
            .unwrap_or_else(|| Value::String(raw.to_string())),
        Err(_) => Value::String(raw.to_string()),
    }
}

/// Apply one `a.b.c=value` override to a TOML tree.
///
/// Intermediate tables are created as needed; a non-table value on the path
/// is an error.
pub fn apply_override(table: &mut Table, assignment: &str) -> Result<(), GraphragError> {
    let (key, raw) = assignment.split_once('=').ok_or_else(|| {
        GraphragError::InvalidConfig(format!(
            "Override '{}' must have the form key=value",
            assignment
        ))
    })?;
    let segments: Vec<&str> = key.trim().split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(GraphragError::InvalidConfig(format!(
            "Override key '{}' is malformed",
            key
        )));
    }

    let Some((last, parents)) = segments.split_last() else {
        return Err(GraphragError::InvalidConfig("Empty override key".to_string()));
    };
    let mut current = table;
    for segment in parents {
        let entry = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        current = match entry {
            Value::Table(inner) => inner,
            _ => {
                return Err(GraphragError::InvalidConfig(format!(
                    "Override '{}': '{}' is not a table",
                    key, segment
                )));
            }
        };
    }
    current.insert((*last).to_string(), parse_override_value(raw.trim()));
    Ok(())
}

/// Build a configuration from TOML text and overrides.
pub fn config_from_str(text: &str, overrides: &[String]) -> Result<PretrainConfig, GraphragError> {
    let mut table: Table = text
        .parse()
        .map_err(|e| GraphragError::InvalidConfig(format!("Invalid TOML: {}", e)))?;
    for assignment in overrides {
        apply_override(&mut table, assignment)?;
    }
    table
        .try_into()
        .map_err(|e| GraphragError::InvalidConfig(e.to_string()))
}

/// Load the configuration file (or defaults when `path` is `None`) and apply
/// overrides.
pub fn load_config(
    path: Option<&Path>,
    overrides: &[String],
) -> Result<PretrainConfig, GraphragError> {
    let text = match path {
        None => String::new(),
        Some(path) => {
            let metadata = std::fs::metadata(path).map_err(|e| {
                GraphragError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
            })?;
            if metadata.len() > MAX_CONFIG_FILE_SIZE {
                return Err(GraphragError::InvalidConfig(format!(
                    "Config file size {} bytes exceeds maximum {} bytes",
                    metadata.len(),
                    MAX_CONFIG_FILE_SIZE
                )));
            }
            std::fs::read_to_string(path).map_err(|e| {
                GraphragError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
            })?
        }
    };
    config_from_str(&text, overrides)
}

/// Resolved configuration as pretty JSON, for the startup log.
pub fn config_to_pretty_json(config: &PretrainConfig) -> Result<String, GraphragError> {
    serde_json::to_string_pretty(config)
        .map_err(|e| GraphragError::SerializationError(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
