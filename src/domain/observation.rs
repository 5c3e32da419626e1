use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{EquipmentCode, Importance};

/// A free-text maintenance note tied to one equipment and one date.
///
/// Text fields are stored exactly as given. Callers are expected to trim
/// them and to reject an empty observation or analyst before saving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// The equipment this observation refers to.
    pub equipment: EquipmentCode,
    /// Calendar date of the observation.
    pub date: NaiveDate,
    /// What was observed.
    pub observation: String,
    /// What should be done about it.
    pub recommendation: String,
    /// Work already performed, and free notes.
    pub work_notes: String,
    /// Name of the analyst who recorded it.
    pub analyst: String,
    /// Optional severity classification.
    pub importance: Option<Importance>,
}

impl Observation {
    /// Returns `true` if this observation is identified by `(equipment, date)`.
    #[must_use]
    pub fn is_keyed_by(&self, equipment: &EquipmentCode, date: NaiveDate) -> bool {
        &self.equipment == equipment && self.date == date
    }
}
