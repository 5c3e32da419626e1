//! The measurement workbook: one sheet per equipment, each with a small
//! interactive analysis block.
//!
//! Sheet layout, zero-based columns:
//!
//! | col   | content                                              |
//! |-------|------------------------------------------------------|
//! | A..F  | point, date, then one column per [`Metric`]          |
//! | H, I  | point and metric selectors (row 2), department (row 5)|
//! | J, K  | date and value of the rows matching both selectors   |
//! | M, N  | hidden lists feeding the two selectors               |
//!
//! The chart sits below the table and plots J against K.

use std::collections::{BTreeMap, BTreeSet};

use rust_xlsxwriter::{
    Chart, ChartType, DataValidation, Format, Formula, Workbook, Worksheet,
    utility::column_number_to_name,
};

use super::{ExportError, style};
use crate::domain::{Equipment, EquipmentCode, Measurement, MeasurementPoint, Metric, department_of};

const SHEET_NAME_LIMIT: usize = 31;
const FORBIDDEN_IN_SHEET_NAME: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
const EMPTY_SHEET: &str = "Suivi";

const POINT_COL: u16 = 0;
const DATE_COL: u16 = 1;
const FIRST_METRIC_COL: u16 = 2;
const SELECTOR_COL: u16 = 7;
const SERIES_DATE_COL: u16 = 9;
const SERIES_VALUE_COL: u16 = 10;
const POINT_LIST_COL: u16 = 12;
const METRIC_LIST_COL: u16 = 13;

const CAPS: [usize; 6] = [45, 12, 16, 16, 16, 20];
const CHART_WIDTH: u32 = 720;
const CHART_HEIGHT: u32 = 360;

/// The worksheet name used for an equipment code.
///
/// Characters a workbook forbids in sheet names become `_`, and the result
/// is cut to the 31-character limit.
#[must_use]
pub fn sheet_name(code: &EquipmentCode) -> String {
    code.as_str()
        .chars()
        .map(|c| if FORBIDDEN_IN_SHEET_NAME.contains(&c) { '_' } else { c })
        .take(SHEET_NAME_LIMIT)
        .collect()
}

/// Gives each code a distinct sheet name, suffixing collisions after
/// truncation.
fn unique_sheet_names<'a>(codes: impl IntoIterator<Item = &'a EquipmentCode>) -> Vec<String> {
    let mut taken = BTreeSet::new();
    codes
        .into_iter()
        .map(|code| {
            let base = sheet_name(code);
            let mut name = base.clone();
            let mut n = 2;
            while !taken.insert(name.to_lowercase()) {
                let suffix = format!("~{n}");
                let keep = SHEET_NAME_LIMIT - suffix.chars().count();
                name = base.chars().take(keep).chain(suffix.chars()).collect();
                n += 1;
            }
            name
        })
        .collect()
}

/// Builds the measurement workbook.
///
/// Rows are grouped by equipment, one sheet each, and sorted by point then
/// date. The roster supplies each sheet's department.
///
/// # Errors
///
/// Returns an error if the workbook cannot be assembled.
pub fn export_measurements<'a>(
    measurements: impl IntoIterator<Item = &'a Measurement>,
    roster: &[Equipment],
) -> Result<Vec<u8>, ExportError> {
    let mut by_equipment: BTreeMap<&EquipmentCode, Vec<&Measurement>> = BTreeMap::new();
    for measurement in measurements {
        by_equipment
            .entry(&measurement.equipment)
            .or_default()
            .push(measurement);
    }

    let mut workbook = Workbook::new();
    if by_equipment.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name(EMPTY_SHEET)?;
        style::write_header(sheet, &table_headers())?;
        return Ok(workbook.save_to_buffer()?);
    }

    let names = unique_sheet_names(by_equipment.keys().copied());
    for ((code, mut rows), name) in by_equipment.into_iter().zip(names) {
        rows.sort_by_key(|m| (m.point, m.date));
        let sheet = workbook.add_worksheet();
        sheet.set_name(&name)?;
        write_sheet(sheet, &name, &rows, department_of(roster, code).unwrap_or_default())?;
        tracing::debug!("exported {} measurements for {code}", rows.len());
    }

    Ok(workbook.save_to_buffer()?)
}

fn table_headers() -> Vec<&'static str> {
    ["Point de mesure", "Date"]
        .into_iter()
        .chain(Metric::ALL.iter().map(|metric| metric.label()))
        .collect()
}

fn write_sheet(
    sheet: &mut Worksheet,
    name: &str,
    rows: &[&Measurement],
    department: &str,
) -> Result<(), ExportError> {
    let headers = table_headers();
    style::write_header(sheet, &headers)?;

    let cell = style::cell();
    let number = style::number();
    let date = style::date();
    let mut widths = style::ColumnWidths::new(&headers, &CAPS);

    for (row, measurement) in (1u32..).zip(rows) {
        let point = measurement.point.label();
        sheet.write_string_with_format(row, POINT_COL, point, &cell)?;
        sheet.write_datetime_with_format(row, DATE_COL, &style::excel_date(measurement.date)?, &date)?;
        widths.observe(usize::from(POINT_COL), point);
        widths.observe(usize::from(DATE_COL), "dd/mm/yyyy");
        for (col, metric) in (FIRST_METRIC_COL..).zip(Metric::ALL) {
            let value = measurement.metric(metric);
            sheet.write_number_with_format(row, col, value, &number)?;
            widths.observe(usize::from(col), &format!("{value:.2}"));
        }
    }
    widths.apply(sheet)?;

    let last_row = u32::try_from(rows.len()).unwrap_or(u32::MAX);
    let first_point = rows.first().map_or(MeasurementPoint::ALL[0], |m| m.point);
    write_selectors(sheet, first_point, department)?;
    write_series(sheet, last_row, &date)?;
    insert_chart(sheet, name, last_row)?;
    Ok(())
}

fn write_selectors(
    sheet: &mut Worksheet,
    point: MeasurementPoint,
    department: &str,
) -> Result<(), ExportError> {
    let label = style::header();
    let input = style::cell().set_bold();

    sheet.write_string_with_format(0, SELECTOR_COL, "Point de mesure", &label)?;
    sheet.write_string_with_format(0, SELECTOR_COL + 1, "Indicateur", &label)?;
    sheet.write_string_with_format(1, SELECTOR_COL, point.label(), &input)?;
    sheet.write_string_with_format(1, SELECTOR_COL + 1, Metric::Speed.label(), &input)?;
    sheet.write_string_with_format(3, SELECTOR_COL, "Département", &label)?;
    sheet.write_string_with_format(4, SELECTOR_COL, department, &input)?;
    sheet.set_column_width(SELECTOR_COL, 40)?;
    sheet.set_column_width(SELECTOR_COL + 1, 22)?;

    write_hidden_list(
        sheet,
        POINT_LIST_COL,
        "Points",
        MeasurementPoint::ALL.iter().map(|p| p.label()),
    )?;
    write_hidden_list(
        sheet,
        METRIC_LIST_COL,
        "Indicateurs",
        Metric::ALL.iter().map(|m| m.label()),
    )?;

    let points = DataValidation::new().allow_list_formula(Formula::new(list_range(
        POINT_LIST_COL,
        MeasurementPoint::ALL.len(),
    )));
    sheet.add_data_validation(1, SELECTOR_COL, 1, SELECTOR_COL, &points)?;

    let metrics = DataValidation::new()
        .allow_list_formula(Formula::new(list_range(METRIC_LIST_COL, Metric::ALL.len())));
    sheet.add_data_validation(1, SELECTOR_COL + 1, 1, SELECTOR_COL + 1, &metrics)?;
    Ok(())
}

fn write_hidden_list<'a>(
    sheet: &mut Worksheet,
    col: u16,
    title: &str,
    items: impl Iterator<Item = &'a str>,
) -> Result<(), ExportError> {
    sheet.write_string(0, col, title)?;
    for (row, item) in (1u32..).zip(items) {
        sheet.write_string(row, col, item)?;
    }
    sheet.set_column_hidden(col)?;
    Ok(())
}

/// The absolute range holding a helper list, e.g. `=$M$2:$M$7`.
fn list_range(col: u16, len: usize) -> String {
    let letter = column_number_to_name(col);
    format!("=${letter}$2:${letter}${}", len + 1)
}

/// Writes the filtered date/value series for rows `2..=last_row + 1`.
///
/// Rows not matching the point selector resolve to `#N/A`, which the chart
/// skips.
fn write_series(sheet: &mut Worksheet, last_row: u32, date: &Format) -> Result<(), ExportError> {
    let label = style::header();
    let number = style::number();
    sheet.write_string_with_format(0, SERIES_DATE_COL, "Date", &label)?;
    sheet.write_string_with_format(0, SERIES_VALUE_COL, "Value", &label)?;

    let [point, day, first, last] =
        [POINT_COL, DATE_COL, FIRST_METRIC_COL, FIRST_METRIC_COL + 3].map(column_number_to_name);
    let point_selector = column_number_to_name(SELECTOR_COL);
    let metric_selector = column_number_to_name(SELECTOR_COL + 1);

    for row in 1..=last_row {
        let n = row + 1;
        let matches = format!("${point}{n}=${point_selector}$2");
        sheet.write_formula_with_format(
            row,
            SERIES_DATE_COL,
            Formula::new(format!("=IF({matches},${day}{n},NA())")),
            date,
        )?;
        sheet.write_formula_with_format(
            row,
            SERIES_VALUE_COL,
            Formula::new(format!(
                "=IF({matches},INDEX(${first}{n}:${last}{n},MATCH(${metric_selector}$2,${first}$1:${last}$1,0)),NA())"
            )),
            &number,
        )?;
    }
    sheet.set_column_width(SERIES_DATE_COL, 12)?;
    sheet.set_column_width(SERIES_VALUE_COL, 12)?;
    Ok(())
}

fn insert_chart(sheet: &mut Worksheet, name: &str, last_row: u32) -> Result<(), ExportError> {
    let mut chart = Chart::new(ChartType::Line);
    chart
        .add_series()
        .set_categories((name, 1, SERIES_DATE_COL, last_row.max(1), SERIES_DATE_COL))
        .set_values((name, 1, SERIES_VALUE_COL, last_row.max(1), SERIES_VALUE_COL));
    chart.x_axis().set_name("Date").set_num_format("dd/mm/yyyy");
    chart.y_axis().set_name("Value");
    chart.legend().set_hidden();
    chart.set_width(CHART_WIDTH).set_height(CHART_HEIGHT);

    sheet.insert_chart(last_row + 2, 0, &chart)?;
    Ok(())
}
