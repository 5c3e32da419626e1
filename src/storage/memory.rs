//! An in-memory backend for exercising the data access layer.

use chrono::NaiveDate;

use crate::{
    domain::{Equipment, EquipmentCode, Measurement, MeasurementPoint, Observation, schema},
    storage::{Backend, CascadeCounts, StorageError},
};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    pub equipment: Vec<Equipment>,
    pub observations: Vec<Observation>,
    pub measurements: Vec<Measurement>,
    /// When set, every operation fails as an unreachable store would.
    pub offline: bool,
}

impl MemoryBackend {
    pub fn seeded() -> Self {
        let mut backend = Self::default();
        backend.initialise().expect("memory backend is online");
        backend
    }

    fn online(&self, operation: &str) -> Result<(), StorageError> {
        if self.offline {
            Err(StorageError::Rejected {
                operation: operation.to_string(),
                status: 503,
                body: "store offline".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Backend for MemoryBackend {
    fn initialise(&mut self) -> Result<(), StorageError> {
        self.online("initialise")?;
        if self.equipment.is_empty() {
            self.equipment = schema::SEED_ROSTER
                .iter()
                .map(|(code, department)| {
                    Equipment::new(EquipmentCode::new(*code).expect("seed codes are valid"), *department)
                })
                .collect();
        }
        Ok(())
    }

    fn load_equipment(&self) -> Result<Vec<Equipment>, StorageError> {
        self.online("load equipment")?;
        Ok(self.equipment.clone())
    }

    fn load_observations(&self) -> Result<Vec<Observation>, StorageError> {
        self.online("load observations")?;
        Ok(self.observations.clone())
    }

    fn load_measurements(&self) -> Result<Vec<Measurement>, StorageError> {
        self.online("load measurements")?;
        Ok(self.measurements.clone())
    }

    fn insert_equipment(&mut self, equipment: &Equipment) -> Result<(), StorageError> {
        self.online("insert equipment")?;
        self.equipment.push(equipment.clone());
        Ok(())
    }

    fn append_observation(&mut self, observation: &Observation) -> Result<(), StorageError> {
        self.online("append observation")?;
        self.observations.push(observation.clone());
        Ok(())
    }

    fn append_measurement(&mut self, measurement: &Measurement) -> Result<(), StorageError> {
        self.online("append measurement")?;
        self.measurements.push(measurement.rounded());
        Ok(())
    }

    fn delete_observations(
        &mut self,
        equipment: &EquipmentCode,
        date: NaiveDate,
    ) -> Result<usize, StorageError> {
        self.online("delete observations")?;
        let before = self.observations.len();
        self.observations.retain(|o| !o.is_keyed_by(equipment, date));
        Ok(before - self.observations.len())
    }

    fn delete_measurements(
        &mut self,
        equipment: &EquipmentCode,
        point: MeasurementPoint,
        date: NaiveDate,
    ) -> Result<usize, StorageError> {
        self.online("delete measurements")?;
        let before = self.measurements.len();
        self.measurements.retain(|m| !m.is_keyed_by(equipment, point, date));
        Ok(before - self.measurements.len())
    }

    fn delete_equipment(&mut self, equipment: &EquipmentCode) -> Result<CascadeCounts, StorageError> {
        self.online("delete equipment")?;
        self.equipment.retain(|e| &e.code != equipment);
        let observations = self.observations.len();
        self.observations.retain(|o| &o.equipment != equipment);
        let measurements = self.measurements.len();
        self.measurements.retain(|m| &m.equipment != equipment);
        Ok(CascadeCounts {
            observations: observations - self.observations.len(),
            measurements: measurements - self.measurements.len(),
        })
    }
}
