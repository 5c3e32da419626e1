use std::{io, path::PathBuf};

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A store file or directory could not be accessed.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// A delimited-text store could not be read or written.
    #[error("failed to process {}: {source}", .path.display())]
    Csv {
        /// The store file.
        path: PathBuf,
        /// The underlying error.
        source: csv::Error,
    },

    /// A workbook store could not be read.
    #[error("failed to read workbook {}: {source}", .path.display())]
    XlsxRead {
        /// The workbook file.
        path: PathBuf,
        /// The underlying error.
        source: calamine::XlsxError,
    },

    /// A workbook store could not be written.
    #[error("failed to write workbook {}: {source}", .path.display())]
    XlsxWrite {
        /// The workbook file.
        path: PathBuf,
        /// The underlying error.
        source: rust_xlsxwriter::XlsxError,
    },

    /// A workbook store has no worksheet.
    #[error("workbook {} has no worksheet", .path.display())]
    NoWorksheet {
        /// The workbook file.
        path: PathBuf,
    },

    /// A loaded store lacks one or more required columns.
    #[error("{store} store is missing column(s): {}", .missing.join(", "))]
    SchemaMismatch {
        /// Which store was loaded.
        store: &'static str,
        /// The absent columns, in schema order.
        missing: Vec<String>,
    },

    /// The recorded schema version could not be read or written.
    #[error("invalid schema state in {}: {message}", .path.display())]
    SchemaState {
        /// The schema state file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// The hosted backend could not be reached.
    #[error("request to hosted backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The access key cannot be sent as an HTTP header.
    #[error("access key contains characters not allowed in an HTTP header")]
    InvalidAccessKey,

    /// The hosted backend answered with an error status.
    #[error("hosted backend rejected {operation} (HTTP {status}): {body}")]
    Rejected {
        /// The operation attempted.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// The hosted backend did not report how many rows matched.
    #[error("hosted backend returned no row count for {table}")]
    MissingCount {
        /// The table counted.
        table: String,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}
