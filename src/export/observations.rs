use std::cmp::Reverse;

use rust_xlsxwriter::Workbook;

use super::{ExportError, style};
use crate::domain::{Equipment, Observation, department_of};

const SHEET: &str = "Observations";
const HEADERS: [&str; 8] = [
    "Département",
    "ID Équipement",
    "Date",
    "Observation",
    "Recommandation",
    "Travaux effectués & Notes",
    "Analyste",
    "Importance",
];
const CAPS: [usize; 8] = [25, 20, 12, 50, 50, 50, 25, 15];

/// Builds the observation report, newest first.
///
/// Each observation is joined to the roster for its department; an
/// observation whose equipment is not on the roster is kept with an empty
/// department.
///
/// # Errors
///
/// Returns an error if the workbook cannot be assembled.
pub fn export_observations<'a>(
    observations: impl IntoIterator<Item = &'a Observation>,
    roster: &[Equipment],
) -> Result<Vec<u8>, ExportError> {
    let mut rows: Vec<&Observation> = observations.into_iter().collect();
    rows.sort_by_key(|observation| Reverse(observation.date));

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET)?;
    style::write_header(sheet, &HEADERS)?;

    let format = style::cell();
    let mut widths = style::ColumnWidths::new(&HEADERS, &CAPS);
    for (row, observation) in (1u32..).zip(&rows) {
        let cells = [
            department_of(roster, &observation.equipment)
                .unwrap_or_default()
                .to_string(),
            observation.equipment.to_string(),
            observation.date.format(style::DATE_LAYOUT).to_string(),
            observation.observation.clone(),
            observation.recommendation.clone(),
            observation.work_notes.clone(),
            observation.analyst.clone(),
            observation
                .importance
                .map(|level| level.label().to_string())
                .unwrap_or_default(),
        ];
        for (column, text) in cells.iter().enumerate() {
            let col = u16::try_from(column).unwrap_or(u16::MAX);
            sheet.write_string_with_format(row, col, text, &format)?;
            widths.observe(column, text);
        }
        sheet.set_row_height(row, style::row_height(&cells))?;
    }
    widths.apply(sheet)?;

    tracing::debug!("exported {} observations", rows.len());
    Ok(workbook.save_to_buffer()?)
}
