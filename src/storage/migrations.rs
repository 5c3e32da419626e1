//! Ordered, versioned schema changes for the file backend.
//!
//! The applied version is recorded in `schema.toml` in the data directory.
//! Each migration runs at most once per data directory, and each one is
//! safe to re-run should the version record be lost.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    domain::schema::COL_IMPORTANCE,
    storage::{
        FileBackend, StorageError,
        file::{StagedFile, write_csv},
    },
};

/// File name of the schema version record.
pub const SCHEMA_FILE: &str = "schema.toml";

struct Migration {
    version: u32,
    description: &'static str,
    apply: fn(&FileBackend) -> Result<(), StorageError>,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        description: "create history stores",
        apply: create_history_stores,
    },
    Migration {
        version: 2,
        description: "add importance column to observations",
        apply: add_importance_column,
    },
];

/// The schema version this build writes.
#[must_use]
pub fn latest_version() -> u32 {
    MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SchemaState {
    #[serde(default)]
    version: u32,
}

/// Reads the recorded schema version. A missing record is version 0.
///
/// # Errors
///
/// Returns [`StorageError::SchemaState`] if the record exists but cannot be
/// read or parsed.
pub fn current_version(backend: &FileBackend) -> Result<u32, StorageError> {
    let path = backend.dir().join(SCHEMA_FILE);
    if !path.exists() {
        return Ok(0);
    }
    let state_error = |message: String| StorageError::SchemaState {
        path: path.clone(),
        message,
    };
    let content = fs::read_to_string(&path).map_err(|e| state_error(e.to_string()))?;
    let state: SchemaState = toml::from_str(&content).map_err(|e| state_error(e.to_string()))?;
    Ok(state.version)
}

fn record_version(backend: &FileBackend, version: u32) -> Result<(), StorageError> {
    let path = backend.dir().join(SCHEMA_FILE);
    let content = toml::to_string(&SchemaState { version }).map_err(|e| StorageError::SchemaState {
        path: path.clone(),
        message: e.to_string(),
    })?;
    fs::write(&path, content).map_err(|e| StorageError::io(&path, e))
}

/// Applies every migration newer than the recorded version, in order.
///
/// # Errors
///
/// Stops at the first failing migration; the version record then reflects
/// the last migration that succeeded.
pub fn run(backend: &FileBackend) -> Result<(), StorageError> {
    let current = current_version(backend)?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::info!(
            "applying schema migration {}: {}",
            migration.version,
            migration.description
        );
        (migration.apply)(backend)?;
        record_version(backend, migration.version)?;
    }
    Ok(())
}

fn create_history_stores(backend: &FileBackend) -> Result<(), StorageError> {
    backend.ensure_history_stores()
}

fn add_importance_column(backend: &FileBackend) -> Result<(), StorageError> {
    let path = backend.observations_path();
    if path.exists() {
        if let Some(staged) = add_column(&path, COL_IMPORTANCE)? {
            staged.commit()?;
        }
    }
    Ok(())
}

/// Appends an empty column to a delimited-text store that lacks it.
///
/// Returns `None` when the column is already present.
fn add_column(path: &Path, column: &str) -> Result<Option<StagedFile>, StorageError> {
    let csv_error = |e| StorageError::csv(path, e);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let mut header = reader.headers().map_err(csv_error)?.clone();
    if header.iter().any(|h| h == column) {
        return Ok(None);
    }
    let width = header.len();
    header.push_field(column);

    let mut records = Vec::new();
    for record in reader.records() {
        let mut record = record.map_err(csv_error)?;
        while record.len() < width {
            record.push_field("");
        }
        record.push_field("");
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let header_fields: Vec<&str> = header.iter().collect();
    write_csv(path, &header_fields, records).map(Some)
}
