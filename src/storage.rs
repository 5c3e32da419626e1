//! Persistence of the roster and the maintenance history.
//!
//! Two interchangeable backends implement [`Backend`]: [`FileBackend`] keeps
//! tabular files in a local directory, [`HostedBackend`] talks to a hosted
//! database. [`connect`] picks one from the configuration.

use std::path::Path;

use chrono::NaiveDate;

use crate::domain::{
    BackendKind, Config, ConfigError, Equipment, EquipmentCode, HostedCredentials, Measurement,
    MeasurementPoint, Observation,
};

mod error;
pub use error::StorageError;

/// Filesystem backend.
pub mod file;
pub use file::FileBackend;

/// Hosted REST backend.
pub mod hosted;
pub use hosted::HostedBackend;

/// Schema migrations for the filesystem backend.
pub mod migrations;

mod rows;
pub use rows::{DATE_FORMAT, RowError, format_date, format_reading, parse_date};

#[cfg(test)]
pub(crate) mod memory;

/// Number of history records removed along with a piece of equipment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeCounts {
    /// Observations removed.
    pub observations: usize,
    /// Measurements removed.
    pub measurements: usize,
}

/// A store for equipment, observations and measurements.
///
/// Loads return every valid record; rows that cannot be parsed are skipped
/// and logged. Deletes return how many records matched.
pub trait Backend {
    /// Prepares the store for use, seeding the example roster when the
    /// equipment store is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be created or migrated.
    fn initialise(&mut self) -> Result<(), StorageError>;

    /// Loads the equipment roster.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or its schema is wrong.
    fn load_equipment(&self) -> Result<Vec<Equipment>, StorageError>;

    /// Loads every observation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or its schema is wrong.
    fn load_observations(&self) -> Result<Vec<Observation>, StorageError>;

    /// Loads every measurement.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or its schema is wrong.
    fn load_measurements(&self) -> Result<Vec<Measurement>, StorageError>;

    /// Adds a piece of equipment to the roster.
    ///
    /// # Errors
    ///
    /// Returns an error if the roster cannot be written.
    fn insert_equipment(&mut self, equipment: &Equipment) -> Result<(), StorageError>;

    /// Appends an observation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn append_observation(&mut self, observation: &Observation) -> Result<(), StorageError>;

    /// Appends a measurement, rounding its readings to two decimals.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn append_measurement(&mut self, measurement: &Measurement) -> Result<(), StorageError>;

    /// Removes every observation keyed by `(equipment, date)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be rewritten.
    fn delete_observations(
        &mut self,
        equipment: &EquipmentCode,
        date: NaiveDate,
    ) -> Result<usize, StorageError>;

    /// Removes every measurement keyed by `(equipment, point, date)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be rewritten.
    fn delete_measurements(
        &mut self,
        equipment: &EquipmentCode,
        point: MeasurementPoint,
        date: NaiveDate,
    ) -> Result<usize, StorageError>;

    /// Removes a piece of equipment together with all of its history.
    ///
    /// # Errors
    ///
    /// Returns an error if any store cannot be rewritten.
    fn delete_equipment(&mut self, equipment: &EquipmentCode) -> Result<CascadeCounts, StorageError>;
}

impl<T: Backend + ?Sized> Backend for Box<T> {
    fn initialise(&mut self) -> Result<(), StorageError> {
        (**self).initialise()
    }

    fn load_equipment(&self) -> Result<Vec<Equipment>, StorageError> {
        (**self).load_equipment()
    }

    fn load_observations(&self) -> Result<Vec<Observation>, StorageError> {
        (**self).load_observations()
    }

    fn load_measurements(&self) -> Result<Vec<Measurement>, StorageError> {
        (**self).load_measurements()
    }

    fn insert_equipment(&mut self, equipment: &Equipment) -> Result<(), StorageError> {
        (**self).insert_equipment(equipment)
    }

    fn append_observation(&mut self, observation: &Observation) -> Result<(), StorageError> {
        (**self).append_observation(observation)
    }

    fn append_measurement(&mut self, measurement: &Measurement) -> Result<(), StorageError> {
        (**self).append_measurement(measurement)
    }

    fn delete_observations(
        &mut self,
        equipment: &EquipmentCode,
        date: NaiveDate,
    ) -> Result<usize, StorageError> {
        (**self).delete_observations(equipment, date)
    }

    fn delete_measurements(
        &mut self,
        equipment: &EquipmentCode,
        point: MeasurementPoint,
        date: NaiveDate,
    ) -> Result<usize, StorageError> {
        (**self).delete_measurements(equipment, point, date)
    }

    fn delete_equipment(&mut self, equipment: &EquipmentCode) -> Result<CascadeCounts, StorageError> {
        (**self).delete_equipment(equipment)
    }
}

/// Errors raised while selecting and opening a backend.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The hosted backend is selected but its credentials are unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The backend could not be opened.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Opens the backend selected by the configuration.
///
/// The file backend's data directory is resolved against `root`; the hosted
/// backend reads its credentials from the environment.
///
/// # Errors
///
/// Returns an error if hosted credentials are missing or the HTTP client
/// cannot be built.
pub fn connect(config: &Config, root: &Path) -> Result<Box<dyn Backend>, ConnectError> {
    match config.backend {
        BackendKind::File => {
            let dir = config.data_dir(root);
            tracing::debug!("using file backend in {}", dir.display());
            Ok(Box::new(FileBackend::new(dir)))
        }
        BackendKind::Hosted => {
            let credentials = HostedCredentials::from_env()?;
            tracing::debug!("using hosted backend at {}", credentials.service_url);
            Ok(Box::new(HostedBackend::new(&credentials)?))
        }
    }
}
