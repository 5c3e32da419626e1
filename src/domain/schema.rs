//! Fixed column sets and closed enumerations.
//!
//! Everything here is constant data shared by the storage backends, the
//! data access layer and the exporter.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Column holding the equipment code in every store.
pub const COL_EQUIPMENT: &str = "id_equipement";
/// Column holding the department in the equipment store.
pub const COL_DEPARTMENT: &str = "departement";
/// Column from an earlier roster revision. Tolerated on read, never written.
pub const COL_LEGACY_EQUIPMENT_NAME: &str = "nom_equipement";
/// Column holding the calendar date in the history stores.
pub const COL_DATE: &str = "date";
/// Observation text column.
pub const COL_OBSERVATION: &str = "observation";
/// Recommendation text column.
pub const COL_RECOMMENDATION: &str = "recommandation";
/// Work performed and notes column (file layout).
pub const COL_WORK_NOTES: &str = "Travaux effectués & Notes";
/// Work performed and notes column (hosted layout).
pub const COL_WORK_NOTES_HOSTED: &str = "travaux_notes";
/// Analyst name column.
pub const COL_ANALYST: &str = "analyste";
/// Importance column, added by the second schema revision.
pub const COL_IMPORTANCE: &str = "importance";
/// Measurement point column.
pub const COL_POINT: &str = "point_mesure";
/// Rotational speed column.
pub const COL_SPEED: &str = "vitesse_rpm";
/// Time-waveform RMS acceleration column.
pub const COL_TWF_RMS: &str = "twf_rms_g";
/// Crest factor column.
pub const COL_CREST_FACTOR: &str = "crest_factor";
/// Time-waveform peak-to-peak acceleration column.
pub const COL_TWF_PEAK_TO_PEAK: &str = "twf_peak_to_peak_g";

/// Columns every equipment store must carry.
pub const EQUIPMENT_COLUMNS: [&str; 2] = [COL_EQUIPMENT, COL_DEPARTMENT];

/// Columns every observation store must carry.
pub const OBSERVATION_REQUIRED_COLUMNS: [&str; 6] = [
    COL_EQUIPMENT,
    COL_DATE,
    COL_OBSERVATION,
    COL_RECOMMENDATION,
    COL_WORK_NOTES,
    COL_ANALYST,
];

/// Columns written to the observation store by the current schema.
pub const OBSERVATION_COLUMNS: [&str; 7] = [
    COL_EQUIPMENT,
    COL_DATE,
    COL_OBSERVATION,
    COL_RECOMMENDATION,
    COL_WORK_NOTES,
    COL_ANALYST,
    COL_IMPORTANCE,
];

/// Columns every measurement store must carry.
pub const MEASUREMENT_COLUMNS: [&str; 7] = [
    COL_EQUIPMENT,
    COL_POINT,
    COL_DATE,
    COL_SPEED,
    COL_TWF_RMS,
    COL_CREST_FACTOR,
    COL_TWF_PEAK_TO_PEAK,
];

/// The fixed example roster used to seed an empty equipment store.
pub const SEED_ROSTER: [(&str, &str); 5] = [
    ("244-3P-1", "Chargement"),
    ("262-1P-4", "CHAUFFERIE"),
    ("32-1H-3", "CHLORE 1"),
    ("25-24P", "ELECTROLYSE 1"),
    ("44-43P", "ÉVAPO 1"),
];

/// Returns the entries of `required` that are absent from `header`.
#[must_use]
pub fn missing_columns<S: AsRef<str>>(header: &[S], required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|column| !header.iter().any(|h| h.as_ref() == **column))
        .map(|column| (*column).to_string())
        .collect()
}

/// A value outside one of the closed enumerations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// A named physical probe location on monitored machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MeasurementPoint {
    /// Motor, non-drive end.
    MotorNonDriveEnd,
    /// Motor, drive end.
    MotorDriveEnd,
    /// Gearbox input shaft.
    GearboxInput,
    /// Gearbox output shaft.
    GearboxOutput,
    /// Driven machine, drive end.
    DrivenDriveEnd,
    /// Driven machine, non-drive end.
    DrivenNonDriveEnd,
}

impl MeasurementPoint {
    /// Every probe location, in the order they are offered to users.
    pub const ALL: [Self; 6] = [
        Self::MotorNonDriveEnd,
        Self::MotorDriveEnd,
        Self::GearboxInput,
        Self::GearboxOutput,
        Self::DrivenDriveEnd,
        Self::DrivenNonDriveEnd,
    ];

    /// The label persisted in the stores and shown in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MotorNonDriveEnd => "Moteur - côté opposé accouplement",
            Self::MotorDriveEnd => "Moteur - côté accouplement",
            Self::GearboxInput => "Réducteur - entrée",
            Self::GearboxOutput => "Réducteur - sortie",
            Self::DrivenDriveEnd => "Machine entraînée - côté accouplement",
            Self::DrivenNonDriveEnd => "Machine entraînée - côté opposé accouplement",
        }
    }
}

impl fmt::Display for MeasurementPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MeasurementPoint {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|point| point.label() == trimmed)
            .ok_or_else(|| UnknownVariant {
                kind: "measurement point",
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for MeasurementPoint {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MeasurementPoint> for String {
    fn from(point: MeasurementPoint) -> Self {
        point.label().to_string()
    }
}

/// Severity classification of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Importance {
    /// Informational.
    Low,
    /// Should be planned.
    Medium,
    /// Needs attention soon.
    High,
    /// Needs immediate action.
    Critical,
}

impl Importance {
    /// Every importance level, from least to most severe.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// The label persisted in the stores and shown in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Faible",
            Self::Medium => "Moyenne",
            Self::High => "Élevée",
            Self::Critical => "Critique",
        }
    }

    /// Parses an optional stored value, where an empty cell means
    /// "unclassified".
    ///
    /// # Errors
    ///
    /// Returns an error if the value is non-empty and not a known level.
    pub fn parse_optional(value: &str) -> Result<Option<Self>, UnknownVariant> {
        if value.trim().is_empty() {
            Ok(None)
        } else {
            value.parse().map(Some)
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Importance {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownVariant {
                kind: "importance level",
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for Importance {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Importance> for String {
    fn from(level: Importance) -> Self {
        level.label().to_string()
    }
}

/// The four numeric readings of a measurement, as charted in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Rotational speed in RPM.
    Speed,
    /// Time-waveform RMS acceleration in g.
    TwfRms,
    /// Crest factor.
    CrestFactor,
    /// Time-waveform peak-to-peak acceleration in g.
    TwfPeakToPeak,
}

impl Metric {
    /// Every metric, in column order.
    pub const ALL: [Self; 4] = [
        Self::Speed,
        Self::TwfRms,
        Self::CrestFactor,
        Self::TwfPeakToPeak,
    ];

    /// Human-readable metric name used as report header and selector value.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Speed => "Vitesse (RPM)",
            Self::TwfRms => "TWF RMS (g)",
            Self::CrestFactor => "Crest factor",
            Self::TwfPeakToPeak => "TWF crête-crête (g)",
        }
    }
}
