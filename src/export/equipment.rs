use rust_xlsxwriter::Workbook;

use super::{ExportError, style};
use crate::domain::Equipment;

const SHEET: &str = "Équipements";
const HEADERS: [&str; 2] = ["ID Équipement", "Département"];
const CAPS: [usize; 2] = [30, 40];

/// Builds the roster workbook, sorted by department then equipment code.
///
/// # Errors
///
/// Returns an error if the workbook cannot be assembled.
pub fn export_equipment<'a>(
    roster: impl IntoIterator<Item = &'a Equipment>,
) -> Result<Vec<u8>, ExportError> {
    let mut rows: Vec<&Equipment> = roster.into_iter().collect();
    rows.sort_by(|a, b| {
        a.department
            .cmp(&b.department)
            .then_with(|| a.code.cmp(&b.code))
    });

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET)?;
    style::write_header(sheet, &HEADERS)?;

    let cell = style::cell();
    let mut widths = style::ColumnWidths::new(&HEADERS, &CAPS);
    for (row, equipment) in (1u32..).zip(&rows) {
        sheet.write_string_with_format(row, 0, equipment.code.as_str(), &cell)?;
        sheet.write_string_with_format(row, 1, &equipment.department, &cell)?;
        widths.observe(0, equipment.code.as_str());
        widths.observe(1, &equipment.department);
    }
    widths.apply(sheet)?;

    tracing::debug!("exported {} equipment", rows.len());
    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{Data, Reader, Xlsx};

    use super::*;
    use crate::domain::EquipmentCode;

    fn equipment(code: &str, department: &str) -> Equipment {
        Equipment::new(EquipmentCode::new(code).unwrap(), department)
    }

    #[test]
    fn sorted_by_department_then_code() {
        let roster = vec![
            equipment("B-2", "Utilities"),
            equipment("Z-9", "Assembly"),
            equipment("A-1", "Utilities"),
        ];

        let bytes = export_equipment(&roster).unwrap();

        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec![SHEET.to_string()]);
        let range = workbook.worksheet_range(SHEET).unwrap();
        let codes: Vec<String> = range
            .rows()
            .map(|row| row[0].to_string())
            .collect();
        assert_eq!(codes, vec!["ID Équipement", "Z-9", "A-1", "B-2"]);
        assert_eq!(range.get_value((2, 1)), Some(&Data::String("Utilities".into())));
    }

    #[test]
    fn empty_roster_still_has_header() {
        let bytes = export_equipment(&Vec::<Equipment>::new()).unwrap();

        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET).unwrap();
        assert_eq!(range.height(), 1);
    }
}
