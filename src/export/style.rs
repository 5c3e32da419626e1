//! Presentation shared by every exported sheet.

use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{
    Color, ExcelDateTime, Format, FormatAlign, FormatBorder, Worksheet, XlsxError,
};

use crate::export::ExportError;

const HEADER_FILL: Color = Color::RGB(0x001F_4E78);
const LINE_HEIGHT: f64 = 15.0;
const WIDTH_PADDING: usize = 2;

/// Day/month/year layout used for every date in an export.
pub const DATE_LAYOUT: &str = "%d/%m/%Y";
const DATE_NUMBER_FORMAT: &str = "dd/mm/yyyy";

pub fn header() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(HEADER_FILL)
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
}

pub fn cell() -> Format {
    Format::new()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Top)
        .set_text_wrap()
}

pub fn number() -> Format {
    cell().set_num_format("0.00")
}

pub fn date() -> Format {
    cell().set_num_format(DATE_NUMBER_FORMAT)
}

/// Converts a calendar date to a workbook date value.
pub fn excel_date(date: NaiveDate) -> Result<ExcelDateTime, ExportError> {
    let out_of_range = |_| ExportError::DateOutOfRange(date);
    let year = u16::try_from(date.year()).map_err(out_of_range)?;
    let month = u8::try_from(date.month()).map_err(out_of_range)?;
    let day = u8::try_from(date.day()).map_err(out_of_range)?;
    Ok(ExcelDateTime::from_ymd(year, month, day)?)
}

/// Writes a bold header row and freezes it.
pub fn write_header<S: AsRef<str>>(
    sheet: &mut Worksheet,
    headers: &[S],
) -> Result<(), XlsxError> {
    let format = header();
    for (column, title) in (0u16..).zip(headers) {
        sheet.write_string_with_format(0, column, title.as_ref(), &format)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

/// Height of a row tall enough for its most broken cell.
pub fn row_height<S: AsRef<str>>(cells: &[S]) -> f64 {
    let breaks = cells
        .iter()
        .map(|cell| cell.as_ref().matches('\n').count())
        .max()
        .unwrap_or(0);
    LINE_HEIGHT * f64::from(u32::try_from(breaks + 1).unwrap_or(u32::MAX))
}

/// Tracks the widest content of each column, bounded by per-column caps.
#[derive(Debug)]
pub struct ColumnWidths {
    widths: Vec<usize>,
    caps: Vec<usize>,
}

impl ColumnWidths {
    pub fn new<S: AsRef<str>>(headers: &[S], caps: &[usize]) -> Self {
        Self {
            widths: headers.iter().map(|h| text_width(h.as_ref())).collect(),
            caps: caps.to_vec(),
        }
    }

    pub fn observe(&mut self, column: usize, text: &str) {
        if let Some(width) = self.widths.get_mut(column) {
            *width = (*width).max(text_width(text));
        }
    }

    pub fn apply(&self, sheet: &mut Worksheet) -> Result<(), XlsxError> {
        for (column, (width, cap)) in (0u16..).zip(self.widths.iter().zip(&self.caps)) {
            let width = (width + WIDTH_PADDING).min(*cap);
            sheet.set_column_width(column, f64::from(u32::try_from(width).unwrap_or(u32::MAX)))?;
        }
        Ok(())
    }
}

/// Display width of the longest line of `text`.
fn text_width(text: &str) -> usize {
    text.lines().map(|line| line.chars().count()).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_height_follows_line_breaks() {
        assert!((row_height(&["one line", "two\nlines"]) - 30.0).abs() < f64::EPSILON);
        assert!((row_height::<&str>(&[]) - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn widths_use_longest_line_and_respect_caps() {
        let mut widths = ColumnWidths::new(&["Date", "Observation"], &[12, 20]);
        widths.observe(0, "10/01/2024");
        widths.observe(1, "short\na much longer second line of text");

        assert_eq!(widths.widths, vec![10, 33]);
        let capped: Vec<usize> = widths
            .widths
            .iter()
            .zip(&widths.caps)
            .map(|(w, cap)| (w + WIDTH_PADDING).min(*cap))
            .collect();
        assert_eq!(capped, vec![12, 20]);
    }

    #[test]
    fn dates_before_year_zero_are_rejected() {
        let ancient = NaiveDate::from_ymd_opt(-5, 1, 1).unwrap();
        assert!(matches!(excel_date(ancient), Err(ExportError::DateOutOfRange(_))));
    }
}
