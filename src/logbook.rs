//! The maintenance log: load, save and delete operations over a backend.
//!
//! Every operation comes in two forms. The `try_*` form returns a
//! [`Result`]. The plain form never fails: reads return a possibly-empty
//! collection and log the error, writes return an [`Outcome`] carrying a
//! message fit for display.

use chrono::NaiveDate;
use tracing::instrument;

use crate::{
    domain::{CodeError, Equipment, EquipmentCode, Measurement, MeasurementPoint, Observation},
    storage::{Backend, CascadeCounts, StorageError},
};

/// Errors raised by [`Logbook`] operations.
#[derive(Debug, thiserror::Error)]
pub enum LogbookError {
    /// No equipment with this code is on the roster.
    #[error("equipment {0} not found")]
    EquipmentNotFound(EquipmentCode),

    /// No observation matches the pair.
    #[error("no observation found for {equipment} on {date}")]
    ObservationNotFound {
        /// Equipment code searched for.
        equipment: EquipmentCode,
        /// Date searched for.
        date: NaiveDate,
    },

    /// No measurement matches the triple.
    #[error("no measurement found for {equipment} at '{point}' on {date}")]
    MeasurementNotFound {
        /// Equipment code searched for.
        equipment: EquipmentCode,
        /// Measurement point searched for.
        point: MeasurementPoint,
        /// Date searched for.
        date: NaiveDate,
    },

    /// The equipment code is already on the roster.
    #[error("equipment {0} already exists")]
    DuplicateEquipment(EquipmentCode),

    /// The equipment code is not a valid identity.
    #[error(transparent)]
    InvalidCode(#[from] CodeError),

    /// The backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The result of a write, as shown to an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the write took effect.
    pub success: bool,
    /// What happened.
    pub message: String,
}

impl Outcome {
    fn from_result<T>(
        result: Result<T, LogbookError>,
        describe: impl FnOnce(T) -> String,
    ) -> Self {
        match result {
            Ok(value) => Self {
                success: true,
                message: describe(value),
            },
            Err(e) => {
                tracing::warn!("{e}");
                Self {
                    success: false,
                    message: e.to_string(),
                }
            }
        }
    }
}

/// The data access layer over a storage backend.
#[derive(Debug)]
pub struct Logbook<B> {
    backend: B,
}

impl<B: Backend> Logbook<B> {
    /// Wraps an already-connected backend.
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Prepares the backend, running migrations and seeding an empty roster.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialised.
    pub fn initialise(&mut self) -> Result<(), LogbookError> {
        self.backend.initialise()?;
        Ok(())
    }

    /// Loads the roster.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn try_load_equipment(&self) -> Result<Vec<Equipment>, LogbookError> {
        Ok(self.backend.load_equipment()?)
    }

    /// Loads the roster, or nothing if it cannot be read.
    pub fn load_equipment(&self) -> Vec<Equipment> {
        fail_soft("equipment", self.try_load_equipment())
    }

    /// Loads every observation.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn try_load_observations(&self) -> Result<Vec<Observation>, LogbookError> {
        Ok(self.backend.load_observations()?)
    }

    /// Loads every observation, or nothing if they cannot be read.
    pub fn load_observations(&self) -> Vec<Observation> {
        fail_soft("observations", self.try_load_observations())
    }

    /// Loads every measurement.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn try_load_measurements(&self) -> Result<Vec<Measurement>, LogbookError> {
        Ok(self.backend.load_measurements()?)
    }

    /// Loads every measurement, or nothing if they cannot be read.
    pub fn load_measurements(&self) -> Vec<Measurement> {
        fail_soft("measurements", self.try_load_measurements())
    }

    /// Appends an observation, text stored as given.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    #[instrument(skip_all, fields(equipment = %observation.equipment, date = %observation.date))]
    pub fn try_save_observation(&mut self, observation: &Observation) -> Result<(), LogbookError> {
        self.backend.append_observation(observation)?;
        tracing::info!("saved observation");
        Ok(())
    }

    /// Appends an observation.
    pub fn save_observation(&mut self, observation: &Observation) -> Outcome {
        let result = self.try_save_observation(observation);
        Outcome::from_result(result, |()| {
            format!(
                "Observation saved for {} on {}",
                observation.equipment, observation.date
            )
        })
    }

    /// Appends a measurement with every reading rounded to two decimals.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    #[instrument(skip_all, fields(equipment = %measurement.equipment, point = %measurement.point, date = %measurement.date))]
    pub fn try_save_measurement(&mut self, measurement: &Measurement) -> Result<Measurement, LogbookError> {
        let rounded = measurement.rounded();
        self.backend.append_measurement(&rounded)?;
        tracing::info!("saved measurement");
        Ok(rounded)
    }

    /// Appends a measurement.
    pub fn save_measurement(&mut self, measurement: &Measurement) -> Outcome {
        let result = self.try_save_measurement(measurement);
        Outcome::from_result(result, |saved| {
            format!(
                "Measurement saved for {} at '{}' on {}",
                saved.equipment, saved.point, saved.date
            )
        })
    }

    /// Removes every observation recorded for `equipment` on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`LogbookError::ObservationNotFound`] if nothing matches.
    #[instrument(skip(self))]
    pub fn try_delete_observation(
        &mut self,
        equipment: &EquipmentCode,
        date: NaiveDate,
    ) -> Result<usize, LogbookError> {
        match self.backend.delete_observations(equipment, date)? {
            0 => Err(LogbookError::ObservationNotFound {
                equipment: equipment.clone(),
                date,
            }),
            removed => {
                tracing::info!("deleted {removed} observation(s)");
                Ok(removed)
            }
        }
    }

    /// Removes every observation recorded for `equipment` on `date`.
    pub fn delete_observation(&mut self, equipment: &EquipmentCode, date: NaiveDate) -> Outcome {
        let result = self.try_delete_observation(equipment, date);
        Outcome::from_result(result, |removed| {
            format!("Deleted {removed} observation(s) for {equipment} on {date}")
        })
    }

    /// Removes every measurement keyed by the triple.
    ///
    /// # Errors
    ///
    /// Returns [`LogbookError::MeasurementNotFound`] if nothing matches.
    #[instrument(skip(self))]
    pub fn try_delete_measurement(
        &mut self,
        equipment: &EquipmentCode,
        point: MeasurementPoint,
        date: NaiveDate,
    ) -> Result<usize, LogbookError> {
        match self.backend.delete_measurements(equipment, point, date)? {
            0 => Err(LogbookError::MeasurementNotFound {
                equipment: equipment.clone(),
                point,
                date,
            }),
            removed => {
                tracing::info!("deleted {removed} measurement(s)");
                Ok(removed)
            }
        }
    }

    /// Removes every measurement keyed by the triple.
    pub fn delete_measurement(
        &mut self,
        equipment: &EquipmentCode,
        point: MeasurementPoint,
        date: NaiveDate,
    ) -> Outcome {
        let result = self.try_delete_measurement(equipment, point, date);
        Outcome::from_result(result, |removed| {
            format!("Deleted {removed} measurement(s) for {equipment} at '{point}' on {date}")
        })
    }

    /// Counts the history that deleting `equipment` would remove.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read.
    pub fn dependents(&self, equipment: &EquipmentCode) -> Result<CascadeCounts, LogbookError> {
        Ok(CascadeCounts {
            observations: self
                .try_load_observations()?
                .iter()
                .filter(|o| &o.equipment == equipment)
                .count(),
            measurements: self
                .try_load_measurements()?
                .iter()
                .filter(|m| &m.equipment == equipment)
                .count(),
        })
    }

    /// Removes a piece of equipment and all of its history.
    ///
    /// # Errors
    ///
    /// Returns [`LogbookError::EquipmentNotFound`] if the code is not on the
    /// roster.
    #[instrument(skip(self))]
    pub fn try_delete_equipment(
        &mut self,
        equipment: &EquipmentCode,
    ) -> Result<CascadeCounts, LogbookError> {
        if !self
            .try_load_equipment()?
            .iter()
            .any(|entry| &entry.code == equipment)
        {
            return Err(LogbookError::EquipmentNotFound(equipment.clone()));
        }
        let counts = self.backend.delete_equipment(equipment)?;
        tracing::info!(
            "deleted equipment with {} observation(s) and {} measurement(s)",
            counts.observations,
            counts.measurements
        );
        Ok(counts)
    }

    /// Removes a piece of equipment and all of its history.
    pub fn delete_equipment(&mut self, equipment: &EquipmentCode) -> Outcome {
        let result = self.try_delete_equipment(equipment);
        Outcome::from_result(result, |counts| {
            format!(
                "Equipment {equipment} deleted, along with {} observation(s) and {} measurement(s)",
                counts.observations, counts.measurements
            )
        })
    }

    /// Adds a piece of equipment to the roster.
    ///
    /// # Errors
    ///
    /// Returns [`LogbookError::InvalidCode`] for a blank code and
    /// [`LogbookError::DuplicateEquipment`] if the code is already taken.
    #[instrument(skip(self))]
    pub fn try_add_equipment(
        &mut self,
        code: &str,
        department: &str,
    ) -> Result<Equipment, LogbookError> {
        let code = EquipmentCode::new(code)?;
        if self.try_load_equipment()?.iter().any(|entry| entry.code == code) {
            return Err(LogbookError::DuplicateEquipment(code));
        }
        let equipment = Equipment::new(code, department.trim());
        self.backend.insert_equipment(&equipment)?;
        tracing::info!("added equipment");
        Ok(equipment)
    }

    /// Adds a piece of equipment to the roster.
    pub fn add_equipment(&mut self, code: &str, department: &str) -> Outcome {
        let result = self.try_add_equipment(code, department);
        Outcome::from_result(result, |added| {
            format!("Equipment {} added to {}", added.code, added.department)
        })
    }
}

fn fail_soft<T>(what: &str, result: Result<Vec<T>, LogbookError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!("could not load {what}: {e}");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        domain::{HistoryFilter, Importance},
        storage::{FileBackend, memory::MemoryBackend},
    };

    fn code(s: &str) -> EquipmentCode {
        EquipmentCode::new(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn observation(equipment: &str, on: NaiveDate) -> Observation {
        Observation {
            equipment: code(equipment),
            date: on,
            observation: "leak".to_string(),
            recommendation: "replace seal".to_string(),
            work_notes: "tightened bolt".to_string(),
            analyst: "J.Doe".to_string(),
            importance: None,
        }
    }

    fn measurement(equipment: &str, point: MeasurementPoint, on: NaiveDate) -> Measurement {
        Measurement {
            equipment: code(equipment),
            point,
            date: on,
            speed_rpm: 1234.5678,
            twf_rms_g: 0.5,
            crest_factor: 3.0,
            twf_peak_to_peak_g: 1.25,
        }
    }

    fn file_logbook() -> (TempDir, Logbook<FileBackend>) {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let mut logbook = Logbook::new(FileBackend::new(tmp.path()));
        logbook.initialise().unwrap();
        (tmp, logbook)
    }

    #[test]
    fn added_equipment_is_loaded_and_duplicates_rejected() {
        let mut logbook = Logbook::new(MemoryBackend::seeded());

        let outcome = logbook.add_equipment("EQ9", "Production");
        assert!(outcome.success, "{}", outcome.message);
        assert!(
            logbook
                .load_equipment()
                .contains(&Equipment::new(code("EQ9"), "Production"))
        );

        let outcome = logbook.add_equipment("EQ9", "Maintenance");
        assert!(!outcome.success);
        assert_eq!(outcome.message, "equipment EQ9 already exists");
        let stored: Vec<_> = logbook
            .load_equipment()
            .into_iter()
            .filter(|e| e.code.as_str() == "EQ9")
            .collect();
        assert_eq!(stored, vec![Equipment::new(code("EQ9"), "Production")]);
    }

    #[test]
    fn blank_equipment_code_is_rejected() {
        let mut logbook = Logbook::new(MemoryBackend::seeded());
        let before = logbook.load_equipment();

        let outcome = logbook.add_equipment("   ", "Production");

        assert!(!outcome.success);
        assert_eq!(logbook.load_equipment(), before);
    }

    #[test]
    fn saved_observation_round_trips_through_files() {
        let (_tmp, mut logbook) = file_logbook();
        let saved = Observation {
            importance: Some(Importance::Medium),
            work_notes: "line one\nline two, with \"quotes\"".to_string(),
            ..observation("244-3P-1", date(2024, 3, 5))
        };

        assert!(logbook.save_observation(&saved).success);

        assert_eq!(logbook.load_observations(), vec![saved]);
    }

    #[test]
    fn deleting_missing_observation_changes_nothing() {
        let mut logbook = Logbook::new(MemoryBackend::seeded());
        logbook
            .try_save_observation(&observation("EQ1", date(2024, 1, 10)))
            .unwrap();
        let before = logbook.load_observations();

        let outcome = logbook.delete_observation(&code("EQ1"), date(2024, 1, 11));

        assert!(!outcome.success);
        assert_eq!(outcome.message, "no observation found for EQ1 on 2024-01-11");
        assert_eq!(logbook.load_observations(), before);
    }

    #[test]
    fn deleting_observation_removes_all_same_day_matches() {
        let mut logbook = Logbook::new(MemoryBackend::seeded());
        let day = date(2024, 1, 10);
        logbook.try_save_observation(&observation("EQ1", day)).unwrap();
        logbook.try_save_observation(&observation("EQ1", day)).unwrap();
        logbook.try_save_observation(&observation("EQ2", day)).unwrap();

        assert_eq!(logbook.try_delete_observation(&code("EQ1"), day).unwrap(), 2);
        assert_eq!(logbook.load_observations().len(), 1);
    }

    #[test]
    fn measurement_delete_needs_the_full_triple() {
        let mut logbook = Logbook::new(MemoryBackend::seeded());
        let day = date(2024, 2, 1);
        logbook
            .try_save_measurement(&measurement("EQ1", MeasurementPoint::MotorDriveEnd, day))
            .unwrap();

        let wrong_point =
            logbook.delete_measurement(&code("EQ1"), MeasurementPoint::GearboxOutput, day);
        assert!(!wrong_point.success);

        let right = logbook.delete_measurement(&code("EQ1"), MeasurementPoint::MotorDriveEnd, day);
        assert!(right.success, "{}", right.message);
        assert!(logbook.load_measurements().is_empty());
    }

    #[test]
    fn readings_are_stored_rounded() {
        let (_tmp, mut logbook) = file_logbook();

        let outcome = logbook.save_measurement(&measurement(
            "244-3P-1",
            MeasurementPoint::GearboxInput,
            date(2024, 2, 1),
        ));

        assert!(outcome.success);
        let loaded = logbook.load_measurements();
        assert!((loaded[0].speed_rpm - 1234.57).abs() < 1e-9);
    }

    #[test]
    fn cascade_reports_exact_counts_then_not_found() {
        let mut logbook = Logbook::new(MemoryBackend::seeded());
        for day in 1..=3 {
            logbook
                .try_save_observation(&observation("32-1H-3", date(2024, 1, day)))
                .unwrap();
        }
        for point in [MeasurementPoint::MotorDriveEnd, MeasurementPoint::GearboxInput] {
            logbook
                .try_save_measurement(&measurement("32-1H-3", point, date(2024, 1, 1)))
                .unwrap();
        }
        logbook
            .try_save_observation(&observation("244-3P-1", date(2024, 1, 1)))
            .unwrap();

        assert_eq!(
            logbook.dependents(&code("32-1H-3")).unwrap(),
            CascadeCounts {
                observations: 3,
                measurements: 2
            }
        );

        let counts = logbook.try_delete_equipment(&code("32-1H-3")).unwrap();
        assert_eq!(
            counts,
            CascadeCounts {
                observations: 3,
                measurements: 2
            }
        );
        assert_eq!(logbook.load_observations().len(), 1);
        assert!(logbook.load_measurements().is_empty());

        let again = logbook.delete_equipment(&code("32-1H-3"));
        assert!(!again.success);
        assert_eq!(again.message, "equipment 32-1H-3 not found");
    }

    #[test]
    fn single_equipment_scenario_on_files() {
        let (_tmp, mut logbook) = file_logbook();
        for seeded in logbook.load_equipment() {
            logbook.try_delete_equipment(&seeded.code).unwrap();
        }
        assert!(logbook.add_equipment("EQ1", "Production").success);

        let saved = observation("EQ1", date(2024, 1, 10));
        assert!(logbook.save_observation(&saved).success);
        assert_eq!(logbook.load_observations(), vec![saved]);

        let outcome = logbook.delete_equipment(&code("EQ1"));

        assert!(outcome.success);
        assert_eq!(
            outcome.message,
            "Equipment EQ1 deleted, along with 1 observation(s) and 0 measurement(s)"
        );
        assert!(logbook.load_observations().is_empty());
    }

    #[test]
    fn unreachable_store_fails_soft() {
        let mut backend = MemoryBackend::seeded();
        backend.offline = true;
        let mut logbook = Logbook::new(backend);

        assert!(logbook.load_equipment().is_empty());
        assert!(logbook.load_observations().is_empty());
        assert!(logbook.load_measurements().is_empty());

        let outcome = logbook.save_observation(&observation("EQ1", date(2024, 1, 10)));
        assert!(!outcome.success);
        assert!(outcome.message.contains("store offline"));
    }

    #[test]
    fn schema_mismatch_loads_empty() {
        let (tmp, logbook) = file_logbook();
        std::fs::write(
            tmp.path().join(crate::storage::file::OBSERVATIONS_FILE),
            "id_equipement,date\nEQ1,2024-01-10\n",
        )
        .unwrap();

        assert!(matches!(
            logbook.try_load_observations(),
            Err(LogbookError::Storage(StorageError::SchemaMismatch { .. }))
        ));
        assert!(logbook.load_observations().is_empty());
    }

    #[test]
    fn department_filter_follows_roster_membership() {
        let mut logbook = Logbook::new(MemoryBackend::seeded());
        logbook
            .try_save_observation(&observation("244-3P-1", date(2024, 1, 1)))
            .unwrap();
        logbook
            .try_save_observation(&observation("262-1P-4", date(2024, 1, 2)))
            .unwrap();
        let roster = logbook.load_equipment();
        let observations = logbook.load_observations();

        let chargement = HistoryFilter::new().departments(["Chargement"]);
        let selected = chargement.apply(&observations, &roster);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].equipment.as_str(), "244-3P-1");
    }
}
