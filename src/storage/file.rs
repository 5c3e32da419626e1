//! A filesystem backed store of equipment, observations and measurements.
//!
//! The roster lives in a workbook (`equipements.xlsx`); the two history
//! stores are delimited text files. Every write reads the full store,
//! applies the change in memory and rewrites the file through a
//! [`StagedFile`], so a failed write never leaves a truncated store behind.

use std::{
    fs,
    path::{Path, PathBuf},
};

use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::NaiveDate;
use rust_xlsxwriter::Workbook;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    domain::{
        Equipment, EquipmentCode, MeasurementPoint, Measurement, Observation,
        schema::{
            self, COL_DEPARTMENT, COL_EQUIPMENT, EQUIPMENT_COLUMNS, MEASUREMENT_COLUMNS,
            OBSERVATION_COLUMNS, OBSERVATION_REQUIRED_COLUMNS,
        },
    },
    storage::{
        Backend, CascadeCounts, StorageError, migrations,
        rows::{EquipmentRow, MeasurementRow, ObservationRow, collect_valid},
    },
};

/// File name of the equipment roster.
pub const EQUIPMENT_FILE: &str = "equipements.xlsx";
/// File name of the observation store.
pub const OBSERVATIONS_FILE: &str = "observations.csv";
/// File name of the measurement store.
pub const MEASUREMENTS_FILE: &str = "suivi_equipements.csv";

const EQUIPMENT_SHEET: &str = "equipements";

/// A storage backend keeping one tabular file per entity in a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Opens a backend rooted at the given data directory.
    ///
    /// Nothing is touched on disk until [`Backend::initialise`] or a write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn equipment_path(&self) -> PathBuf {
        self.dir.join(EQUIPMENT_FILE)
    }

    pub(crate) fn observations_path(&self) -> PathBuf {
        self.dir.join(OBSERVATIONS_FILE)
    }

    pub(crate) fn measurements_path(&self) -> PathBuf {
        self.dir.join(MEASUREMENTS_FILE)
    }

    fn observation_rows(&self) -> Result<Vec<ObservationRow>, StorageError> {
        read_csv(
            &self.observations_path(),
            "observation",
            &OBSERVATION_REQUIRED_COLUMNS,
        )
    }

    fn measurement_rows(&self) -> Result<Vec<MeasurementRow>, StorageError> {
        read_csv(&self.measurements_path(), "measurement", &MEASUREMENT_COLUMNS)
    }

    /// Every non-blank roster row, valid or not.
    fn equipment_rows(&self) -> Result<Vec<EquipmentRow>, StorageError> {
        let path = self.equipment_path();
        let xlsx_error = |source| StorageError::XlsxRead {
            path: path.clone(),
            source,
        };

        let mut workbook: Xlsx<_> = open_workbook(&path).map_err(xlsx_error)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| StorageError::NoWorksheet { path: path.clone() })?
            .map_err(xlsx_error)?;

        let mut rows = range.rows();
        let header: Vec<String> = rows
            .next()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default();

        let column = |name: &str| header.iter().position(|h| h == name);
        let (Some(code_column), Some(department_column)) =
            (column(COL_EQUIPMENT), column(COL_DEPARTMENT))
        else {
            return Err(StorageError::SchemaMismatch {
                store: "equipment",
                missing: schema::missing_columns(&header, &EQUIPMENT_COLUMNS),
            });
        };

        Ok(rows
            .filter(|row| !row.iter().all(|c| matches!(c, Data::Empty)))
            .map(|row| {
                let cell = |column: usize| row.get(column).map(cell_text).unwrap_or_default();
                EquipmentRow {
                    equipment: cell(code_column),
                    department: cell(department_column),
                }
            })
            .collect())
    }

    fn read_equipment(&self) -> Result<Vec<Equipment>, StorageError> {
        Ok(collect_valid("equipment", self.equipment_rows()?))
    }

    pub(crate) fn stage_equipment(&self, roster: &[EquipmentRow]) -> Result<StagedFile, StorageError> {
        let staged = StagedFile::new(&self.equipment_path());
        let xlsx_error = |source| StorageError::XlsxWrite {
            path: staged.target.clone(),
            source,
        };

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(EQUIPMENT_SHEET).map_err(xlsx_error)?;
        for (column, header) in (0u16..).zip(EQUIPMENT_COLUMNS) {
            sheet.write_string(0, column, header).map_err(xlsx_error)?;
        }
        for (row, entry) in (1u32..).zip(roster) {
            sheet
                .write_string(row, 0, &entry.equipment)
                .map_err(xlsx_error)?;
            sheet
                .write_string(row, 1, &entry.department)
                .map_err(xlsx_error)?;
        }
        workbook.save(&staged.staging).map_err(xlsx_error)?;

        Ok(staged)
    }

    pub(crate) fn stage_observations(
        &self,
        rows: &[ObservationRow],
    ) -> Result<StagedFile, StorageError> {
        write_csv(&self.observations_path(), &OBSERVATION_COLUMNS, rows)
    }

    pub(crate) fn stage_measurements(
        &self,
        rows: &[MeasurementRow],
    ) -> Result<StagedFile, StorageError> {
        write_csv(&self.measurements_path(), &MEASUREMENT_COLUMNS, rows)
    }

    /// Creates whichever history store is missing, with its header only.
    pub(crate) fn ensure_history_stores(&self) -> Result<(), StorageError> {
        let stores: [(PathBuf, &[&str]); 2] = [
            (self.observations_path(), &OBSERVATION_COLUMNS),
            (self.measurements_path(), &MEASUREMENT_COLUMNS),
        ];
        for (path, header) in stores {
            if !path.exists() {
                write_csv(&path, header, std::iter::empty::<()>())?.commit()?;
                tracing::info!("created empty store {}", path.display());
            }
        }
        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))
    }
}

impl Backend for FileBackend {
    fn initialise(&mut self) -> Result<(), StorageError> {
        self.ensure_dir()?;
        migrations::run(self)?;
        self.ensure_history_stores()?;

        let empty = !self.equipment_path().exists() || self.equipment_rows()?.is_empty();
        if empty {
            let roster: Vec<EquipmentRow> = schema::SEED_ROSTER
                .iter()
                .map(|(code, department)| EquipmentRow {
                    equipment: (*code).to_string(),
                    department: (*department).to_string(),
                })
                .collect();
            self.stage_equipment(&roster)?.commit()?;
            tracing::info!("seeded roster with {} example equipment", roster.len());
        }
        Ok(())
    }

    fn load_equipment(&self) -> Result<Vec<Equipment>, StorageError> {
        self.read_equipment()
    }

    fn load_observations(&self) -> Result<Vec<Observation>, StorageError> {
        Ok(collect_valid("observation", self.observation_rows()?))
    }

    fn load_measurements(&self) -> Result<Vec<Measurement>, StorageError> {
        Ok(collect_valid("measurement", self.measurement_rows()?))
    }

    fn insert_equipment(&mut self, equipment: &Equipment) -> Result<(), StorageError> {
        let mut roster = if self.equipment_path().exists() {
            self.equipment_rows()?
        } else {
            self.ensure_dir()?;
            Vec::new()
        };
        roster.push(EquipmentRow::from(equipment));
        self.stage_equipment(&roster)?.commit()
    }

    fn append_observation(&mut self, observation: &Observation) -> Result<(), StorageError> {
        let mut rows = self.observation_rows()?;
        rows.push(ObservationRow::from(observation));
        self.stage_observations(&rows)?.commit()
    }

    fn append_measurement(&mut self, measurement: &Measurement) -> Result<(), StorageError> {
        let mut rows = self.measurement_rows()?;
        rows.push(MeasurementRow::from(&measurement.rounded()));
        self.stage_measurements(&rows)?.commit()
    }

    fn delete_observations(
        &mut self,
        equipment: &EquipmentCode,
        date: NaiveDate,
    ) -> Result<usize, StorageError> {
        let mut rows = self.observation_rows()?;
        let before = rows.len();
        rows.retain(|row| !row.is_keyed_by(equipment, date));
        let removed = before - rows.len();
        if removed > 0 {
            self.stage_observations(&rows)?.commit()?;
        }
        Ok(removed)
    }

    fn delete_measurements(
        &mut self,
        equipment: &EquipmentCode,
        point: MeasurementPoint,
        date: NaiveDate,
    ) -> Result<usize, StorageError> {
        let mut rows = self.measurement_rows()?;
        let before = rows.len();
        rows.retain(|row| !row.is_keyed_by(equipment, point, date));
        let removed = before - rows.len();
        if removed > 0 {
            self.stage_measurements(&rows)?.commit()?;
        }
        Ok(removed)
    }

    fn delete_equipment(&mut self, equipment: &EquipmentCode) -> Result<CascadeCounts, StorageError> {
        let mut roster = self.equipment_rows()?;
        let mut observations = self.observation_rows()?;
        let mut measurements = self.measurement_rows()?;

        roster.retain(|row| !row.refers_to(equipment));
        let observations_before = observations.len();
        observations.retain(|row| !row.refers_to(equipment));
        let measurements_before = measurements.len();
        measurements.retain(|row| !row.refers_to(equipment));

        // Stage everything before committing anything.
        let staged = [
            self.stage_observations(&observations)?,
            self.stage_measurements(&measurements)?,
            self.stage_equipment(&roster)?,
        ];
        for file in staged {
            file.commit()?;
        }

        Ok(CascadeCounts {
            observations: observations_before - observations.len(),
            measurements: measurements_before - measurements.len(),
        })
    }
}

/// The text of a workbook cell, trimmed.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// Reads every row of a delimited-text store after checking its header.
///
/// Rows that fail to deserialize are skipped with a warning; I/O failures
/// abort the read.
pub(crate) fn read_csv<R: DeserializeOwned>(
    path: &Path,
    store: &'static str,
    required: &[&str],
) -> Result<Vec<R>, StorageError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| StorageError::csv(path, e))?;

    let header = reader
        .headers()
        .map_err(|e| StorageError::csv(path, e))?
        .clone();
    let missing = schema::missing_columns(&header.iter().collect::<Vec<_>>(), required);
    if !missing.is_empty() {
        return Err(StorageError::SchemaMismatch { store, missing });
    }

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<R>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) if e.is_io_error() => return Err(StorageError::csv(path, e)),
            Err(e) => tracing::warn!("skipping malformed {store} row {}: {e}", index + 2),
        }
    }
    Ok(rows)
}

/// Writes a full delimited-text store to a staging file.
pub(crate) fn write_csv<R: Serialize>(
    path: &Path,
    header: &[&str],
    rows: impl IntoIterator<Item = R>,
) -> Result<StagedFile, StorageError> {
    let staged = StagedFile::new(path);
    let csv_error = |e| StorageError::csv(path, e);

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&staged.staging)
        .map_err(csv_error)?;
    writer.write_record(header).map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|e| StorageError::io(&staged.staging, e))?;

    Ok(staged)
}

/// A file written beside its target and moved into place on commit.
///
/// Dropping an uncommitted stage removes the staging file and leaves the
/// target untouched.
#[derive(Debug)]
pub(crate) struct StagedFile {
    staging: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn new(target: &Path) -> Self {
        let mut name = target
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        Self {
            staging: target.with_file_name(name),
            target: target.to_path_buf(),
            committed: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn staging(&self) -> &Path {
        &self.staging
    }

    /// Moves the staged contents over the target.
    pub(crate) fn commit(mut self) -> Result<(), StorageError> {
        fs::rename(&self.staging, &self.target).map_err(|e| StorageError::io(&self.target, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.staging);
        }
    }
}
