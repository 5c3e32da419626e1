use std::{collections::BTreeSet, fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

/// A validated equipment code.
///
/// Codes are trimmed on construction and must not be empty. They are the
/// identity of an [`Equipment`] and the foreign reference held by every
/// observation and measurement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EquipmentCode(NonEmptyString);

impl EquipmentCode {
    /// Creates a new code, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError`] if the trimmed string is empty.
    pub fn new(code: impl Into<String>) -> Result<Self, CodeError> {
        let code = code.into();
        NonEmptyString::new(code.trim().to_string())
            .map(Self)
            .map_err(|_| CodeError(code))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for EquipmentCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for EquipmentCode {
    type Error = CodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EquipmentCode> for String {
    fn from(code: EquipmentCode) -> Self {
        code.0.into()
    }
}

impl FromStr for EquipmentCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for EquipmentCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for EquipmentCode {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for EquipmentCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an equipment code is blank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid equipment code '{0}': must not be empty")]
pub struct CodeError(String);

/// An entry of the equipment roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    /// Unique equipment code.
    pub code: EquipmentCode,
    /// Department the equipment belongs to.
    pub department: String,
}

impl Equipment {
    /// Creates a roster entry.
    #[must_use]
    pub fn new(code: EquipmentCode, department: impl Into<String>) -> Self {
        Self {
            code,
            department: department.into(),
        }
    }
}

/// Sorted, distinct department names of a roster.
#[must_use]
pub fn departments(roster: &[Equipment]) -> Vec<String> {
    roster
        .iter()
        .map(|equipment| equipment.department.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The roster entries belonging to any of `selected`.
///
/// An empty selection means every department.
#[must_use]
pub fn in_departments<'a>(roster: &'a [Equipment], selected: &BTreeSet<String>) -> Vec<&'a Equipment> {
    roster
        .iter()
        .filter(|equipment| selected.is_empty() || selected.contains(&equipment.department))
        .collect()
}

/// Looks up the department of `code`, if it is on the roster.
#[must_use]
pub fn department_of<'a>(roster: &'a [Equipment], code: &EquipmentCode) -> Option<&'a str> {
    roster
        .iter()
        .find(|equipment| &equipment.code == code)
        .map(|equipment| equipment.department.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> EquipmentCode {
        EquipmentCode::new(s).unwrap()
    }

    #[test]
    fn code_is_trimmed() {
        assert_eq!(code("  EQ1 ").as_str(), "EQ1");
    }

    #[test]
    fn blank_code_is_rejected() {
        assert_eq!(
            EquipmentCode::new("   ").unwrap_err().to_string(),
            "invalid equipment code '   ': must not be empty"
        );
    }

    #[test]
    fn departments_are_sorted_and_distinct() {
        let roster = vec![
            Equipment::new(code("B1"), "Production"),
            Equipment::new(code("A1"), "Chaufferie"),
            Equipment::new(code("A2"), "Production"),
        ];
        assert_eq!(departments(&roster), vec!["Chaufferie", "Production"]);
    }

    #[test]
    fn empty_department_selection_keeps_everything() {
        let roster = vec![
            Equipment::new(code("B1"), "Production"),
            Equipment::new(code("A1"), "Chaufferie"),
        ];
        assert_eq!(in_departments(&roster, &BTreeSet::new()).len(), 2);

        let selected = BTreeSet::from(["Chaufferie".to_string()]);
        let kept = in_departments(&roster, &selected);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].code.as_str(), "A1");
    }

    #[test]
    fn finds_department_of_code() {
        let roster = vec![Equipment::new(code("EQ1"), "Production")];
        assert_eq!(department_of(&roster, &code("EQ1")), Some("Production"));
        assert_eq!(department_of(&roster, &code("EQ2")), None);
    }
}
