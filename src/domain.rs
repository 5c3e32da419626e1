//! Domain models for the maintenance log.
//!
//! This module contains the typed records (equipment, observations,
//! measurements), the fixed schema they are stored under, filter composition
//! over history, and configuration.

/// Column sets and closed enumerations.
pub mod schema;
pub use schema::{Importance, MeasurementPoint, Metric, UnknownVariant};

mod equipment;
pub use equipment::{CodeError, Equipment, EquipmentCode, department_of, departments, in_departments};

mod observation;
pub use observation::Observation;

mod measurement;
pub use measurement::{Measurement, round2};

/// Filter composition over observation and measurement history.
pub mod filter;
pub use filter::{DateRange, HistoryFilter, HistoryRecord};

mod config;
pub use config::{
    ACCESS_KEY_VAR, BackendKind, Config, ConfigError, HostedCredentials, SERVICE_URL_VAR,
};
