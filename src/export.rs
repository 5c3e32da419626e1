//! Spreadsheet reports over the roster and the maintenance history.
//!
//! Every export returns the bytes of an `.xlsx` workbook. Callers decide
//! where they go; the `*_file_name` helpers give the conventional names.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};

mod equipment;
pub use equipment::export_equipment;

mod measurements;
pub use measurements::{export_measurements, sheet_name};

mod observations;
pub use observations::export_observations;

mod style;

/// MIME type of the generated workbooks.
pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Errors raised while building a workbook.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The workbook could not be assembled.
    #[error("failed to build workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// A date cannot be represented in a workbook.
    #[error("date {0} cannot be written to a workbook")]
    DateOutOfRange(NaiveDate),
}

/// `rapport_observations_YYYYMMDD_HHMM.xlsx`
#[must_use]
pub fn observations_file_name(now: NaiveDateTime) -> String {
    format!("rapport_observations_{}.xlsx", now.format("%Y%m%d_%H%M"))
}

/// `equipements_YYYYMMDD.xlsx`, or `equipements_<DEPT>_YYYYMMDD.xlsx` when
/// exactly one department is selected.
#[must_use]
pub fn equipment_file_name(today: NaiveDate, departments: &BTreeSet<String>) -> String {
    let stamp = today.format("%Y%m%d");
    match departments.iter().next() {
        Some(department) if departments.len() == 1 => {
            format!("equipements_{}_{stamp}.xlsx", department.replace(' ', "_"))
        }
        _ => format!("equipements_{stamp}.xlsx"),
    }
}

/// `suivi_equipements_YYYYMMDD_HHMM.xlsx`
#[must_use]
pub fn measurements_file_name(now: NaiveDateTime) -> String {
    format!("suivi_equipements_{}.xlsx", now.format("%Y%m%d_%H%M"))
}
