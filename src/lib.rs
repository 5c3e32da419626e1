//! Maintenance log for industrial equipment
//!
//! Keeps an equipment roster, dated observations and vibration readings in
//! either local files or a hosted table service, and produces spreadsheet
//! reports from them.

pub mod domain;
pub use domain::{
    BackendKind, Config, DateRange, Equipment, EquipmentCode, HistoryFilter, Importance,
    Measurement, MeasurementPoint, Metric, Observation, department_of, departments,
    in_departments,
};

/// Storage backends and the interface they share.
pub mod storage;
pub use storage::{Backend, FileBackend, HostedBackend, StorageError};

/// Data access with cascade delete and fail-soft reads.
pub mod logbook;
pub use logbook::{Logbook, LogbookError, Outcome};

/// Spreadsheet reports.
pub mod export;
