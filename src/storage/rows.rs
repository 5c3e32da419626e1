//! Flat rows as persisted by the file backend, and the conversions between
//! them and the typed records.
//!
//! Rows are deliberately loose (every cell a string) so that a single bad
//! cell fails only its own row, never the whole store. Writes go through
//! the rows, not the typed records, so a row that does not parse is skipped
//! on load but kept on disk.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CodeError, Equipment, EquipmentCode, Importance, Measurement, MeasurementPoint, Observation,
    UnknownVariant, round2,
};

/// Storage format of calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Formats a date as persisted by every backend.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a stored date, discarding any time component.
///
/// # Errors
///
/// Returns [`RowError::Date`] if the value matches none of the accepted
/// layouts.
pub fn parse_date(value: &str) -> Result<NaiveDate, RowError> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Ok(date);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .map(|datetime| datetime.date())
        .ok_or_else(|| RowError::Date(value.to_string()))
}

/// Formats a reading with exactly two decimals.
#[must_use]
pub fn format_reading(value: f64) -> String {
    format!("{:.2}", round2(value))
}

fn parse_reading(column: &'static str, value: &str) -> Result<f64, RowError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .map(round2)
        .ok_or_else(|| RowError::Number {
            column,
            value: value.to_string(),
        })
}

/// A row that could not be turned into a typed record.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    /// The equipment code is blank.
    #[error(transparent)]
    Code(#[from] CodeError),
    /// The date is not in a recognised layout.
    #[error("unrecognised date '{0}'")]
    Date(String),
    /// A numeric column holds something other than a finite number.
    #[error("column {column} holds '{value}', expected a number")]
    Number {
        /// The offending column.
        column: &'static str,
        /// The raw cell.
        value: String,
    },
    /// A closed-enumeration column holds an unknown value.
    #[error(transparent)]
    Variant(#[from] UnknownVariant),
}

/// A roster entry as stored in the equipment workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquipmentRow {
    pub equipment: String,
    pub department: String,
}

impl EquipmentRow {
    pub fn refers_to(&self, equipment: &EquipmentCode) -> bool {
        self.equipment.trim() == equipment.as_str()
    }
}

impl From<&Equipment> for EquipmentRow {
    fn from(equipment: &Equipment) -> Self {
        Self {
            equipment: equipment.code.to_string(),
            department: equipment.department.clone(),
        }
    }
}

impl TryFrom<EquipmentRow> for Equipment {
    type Error = RowError;

    fn try_from(row: EquipmentRow) -> Result<Self, Self::Error> {
        Ok(Self::new(EquipmentCode::new(row.equipment)?, row.department))
    }
}

/// An observation as stored in `observations.csv`.
///
/// Short records deserialize with empty cells.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationRow {
    #[serde(rename = "id_equipement")]
    equipment: String,
    date: String,
    observation: String,
    #[serde(rename = "recommandation")]
    recommendation: String,
    #[serde(rename = "Travaux effectués & Notes")]
    work_notes: String,
    #[serde(rename = "analyste")]
    analyst: String,
    importance: String,
}

impl ObservationRow {
    pub fn refers_to(&self, equipment: &EquipmentCode) -> bool {
        self.equipment.trim() == equipment.as_str()
    }

    /// A row whose date does not parse never matches.
    pub fn is_keyed_by(&self, equipment: &EquipmentCode, date: NaiveDate) -> bool {
        self.refers_to(equipment) && parse_date(&self.date).is_ok_and(|stored| stored == date)
    }
}

impl From<&Observation> for ObservationRow {
    fn from(observation: &Observation) -> Self {
        Self {
            equipment: observation.equipment.to_string(),
            date: format_date(observation.date),
            observation: observation.observation.clone(),
            recommendation: observation.recommendation.clone(),
            work_notes: observation.work_notes.clone(),
            analyst: observation.analyst.clone(),
            importance: observation
                .importance
                .map(|level| level.label().to_string())
                .unwrap_or_default(),
        }
    }
}

impl TryFrom<ObservationRow> for Observation {
    type Error = RowError;

    fn try_from(row: ObservationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            equipment: EquipmentCode::new(row.equipment)?,
            date: parse_date(&row.date)?,
            observation: row.observation,
            recommendation: row.recommendation,
            work_notes: row.work_notes,
            analyst: row.analyst,
            importance: Importance::parse_optional(&row.importance)?,
        })
    }
}

/// A measurement as stored in `suivi_equipements.csv`.
///
/// Short records deserialize with empty cells.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementRow {
    #[serde(rename = "id_equipement")]
    equipment: String,
    #[serde(rename = "point_mesure")]
    point: String,
    date: String,
    #[serde(rename = "vitesse_rpm")]
    speed_rpm: String,
    twf_rms_g: String,
    crest_factor: String,
    twf_peak_to_peak_g: String,
}

impl MeasurementRow {
    pub fn refers_to(&self, equipment: &EquipmentCode) -> bool {
        self.equipment.trim() == equipment.as_str()
    }

    /// A row whose point or date does not parse never matches.
    pub fn is_keyed_by(
        &self,
        equipment: &EquipmentCode,
        point: MeasurementPoint,
        date: NaiveDate,
    ) -> bool {
        self.refers_to(equipment)
            && self
                .point
                .trim()
                .parse::<MeasurementPoint>()
                .is_ok_and(|stored| stored == point)
            && parse_date(&self.date).is_ok_and(|stored| stored == date)
    }
}

impl From<&Measurement> for MeasurementRow {
    fn from(measurement: &Measurement) -> Self {
        Self {
            equipment: measurement.equipment.to_string(),
            point: measurement.point.label().to_string(),
            date: format_date(measurement.date),
            speed_rpm: format_reading(measurement.speed_rpm),
            twf_rms_g: format_reading(measurement.twf_rms_g),
            crest_factor: format_reading(measurement.crest_factor),
            twf_peak_to_peak_g: format_reading(measurement.twf_peak_to_peak_g),
        }
    }
}

impl TryFrom<MeasurementRow> for Measurement {
    type Error = RowError;

    fn try_from(row: MeasurementRow) -> Result<Self, Self::Error> {
        use crate::domain::schema::{COL_CREST_FACTOR, COL_SPEED, COL_TWF_PEAK_TO_PEAK, COL_TWF_RMS};

        Ok(Self {
            equipment: EquipmentCode::new(row.equipment)?,
            point: row.point.parse::<MeasurementPoint>()?,
            date: parse_date(&row.date)?,
            speed_rpm: parse_reading(COL_SPEED, &row.speed_rpm)?,
            twf_rms_g: parse_reading(COL_TWF_RMS, &row.twf_rms_g)?,
            crest_factor: parse_reading(COL_CREST_FACTOR, &row.crest_factor)?,
            twf_peak_to_peak_g: parse_reading(COL_TWF_PEAK_TO_PEAK, &row.twf_peak_to_peak_g)?,
        })
    }
}

/// Converts raw rows to typed records, skipping and logging the bad ones.
pub fn collect_valid<R, T>(store: &str, rows: impl IntoIterator<Item = R>) -> Vec<T>
where
    T: TryFrom<R, Error = RowError>,
{
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| match T::try_from(row) {
            Ok(record) => Some(record),
            Err(e) => {
                // +2: one for the header, one for 1-based numbering
                tracing::warn!("skipping {store} row {}: {e}", index + 2);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("2024-01-10" ; "iso date")]
    #[test_case("2024-01-10 00:00:00" ; "with midnight time")]
    #[test_case("2024-01-10T14:30:00" ; "iso datetime")]
    #[test_case(" 2024-01-10 " ; "padded")]
    fn parses_stored_dates(input: &str) {
        assert_eq!(
            parse_date(input).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
        );
    }

    #[test]
    fn rejects_unparseable_date() {
        assert!(matches!(parse_date("10/01/2024"), Err(RowError::Date(_))));
    }

    #[test]
    fn readings_are_written_with_two_decimals() {
        assert_eq!(format_reading(1234.5678), "1234.57");
        assert_eq!(format_reading(3.0), "3.00");
    }

    #[test]
    fn measurement_row_with_bad_number_is_rejected() {
        let row = MeasurementRow {
            equipment: "EQ1".into(),
            point: MeasurementPoint::GearboxInput.label().into(),
            date: "2024-02-01".into(),
            speed_rpm: "fast".into(),
            twf_rms_g: "0.1".into(),
            crest_factor: "3".into(),
            twf_peak_to_peak_g: "1".into(),
        };
        let error = Measurement::try_from(row).unwrap_err();
        assert_eq!(
            error.to_string(),
            "column vitesse_rpm holds 'fast', expected a number"
        );
    }

    #[test]
    fn observation_without_importance_is_unclassified() {
        let row = ObservationRow {
            equipment: "EQ1".into(),
            date: "2024-01-10".into(),
            observation: "leak".into(),
            recommendation: "replace seal".into(),
            work_notes: "tightened bolt".into(),
            analyst: "J.Doe".into(),
            importance: String::new(),
        };
        let observation = Observation::try_from(row).unwrap();
        assert_eq!(observation.importance, None);
        assert_eq!(observation.work_notes, "tightened bolt");
    }

    #[test]
    fn collect_valid_skips_bad_rows() {
        let good = ObservationRow {
            equipment: "EQ1".into(),
            date: "2024-01-10".into(),
            observation: "leak".into(),
            recommendation: String::new(),
            work_notes: String::new(),
            analyst: "J.Doe".into(),
            importance: "Critique".into(),
        };
        let bad = ObservationRow {
            importance: "Urgent".into(),
            ..good.clone()
        };

        let records: Vec<Observation> = collect_valid("observation", vec![good, bad]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].importance, Some(Importance::Critical));
    }

    #[test]
    fn row_keys_tolerate_padding_and_timestamps() {
        let row = MeasurementRow {
            equipment: " EQ1 ".into(),
            point: MeasurementPoint::GearboxInput.label().into(),
            date: "2024-01-10 00:00:00".into(),
            ..MeasurementRow::default()
        };
        let eq1 = EquipmentCode::new("EQ1").unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

        assert!(row.refers_to(&eq1));
        assert!(row.is_keyed_by(&eq1, MeasurementPoint::GearboxInput, day));
        assert!(!row.is_keyed_by(&eq1, MeasurementPoint::GearboxOutput, day));

        let unparsed = ObservationRow {
            equipment: "EQ1".into(),
            date: "10/01/2024".into(),
            ..ObservationRow::default()
        };
        assert!(unparsed.refers_to(&eq1));
        assert!(!unparsed.is_keyed_by(&eq1, day));
    }
}
