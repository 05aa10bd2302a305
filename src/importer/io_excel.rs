// Primitives for reading Excel workbooks.

use std::io::Cursor;

use calamine::{DataType, Range, Reader, Xls, Xlsx};
use voter_import::builder::SheetBuilder;

use crate::importer::{io_common::simplify_file_name, *};

fn to_cell(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(s) => CellValue::Text(s.clone()),
        DataType::Float(f) => CellValue::Number(*f),
        DataType::Int(i) => CellValue::Number(*i as f64),
        DataType::Bool(b) => CellValue::Bool(*b),
        // Serial date: kept as a number, it is never a NIM or a name anyway.
        DataType::DateTime(f) => CellValue::Number(*f),
        DataType::Empty => CellValue::Empty,
        other => CellValue::Text(format!("{:?}", other)),
    }
}

pub fn range_to_sheet(name: &str, range: &Range<DataType>) -> Sheet {
    let mut builder = SheetBuilder::new(name);
    let mut rows = range.rows();
    if let Some(header) = rows.next() {
        let header: Vec<CellValue> = header.iter().map(to_cell).collect();
        debug!("range_to_sheet: sheet {:?}: header: {:?}", name, header);
        builder.header_row(&header);
    }
    for row in rows {
        let cells: Vec<CellValue> = row.iter().map(to_cell).collect();
        builder.data_row(&cells);
    }
    builder.build()
}

pub fn read_xlsx(path: &str, bytes: Vec<u8>) -> ImportResult<Workbook> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).context(OpeningExcelSnafu { path })?;
    let mut sheets: Vec<Sheet> = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&name)
            .context(MissingWorksheetSnafu {
                sheet: name.clone(),
                path,
            })?
            .context(OpeningExcelSnafu { path })?;
        let sheet = range_to_sheet(&name, &range);
        info!(
            "read_xlsx: {}: sheet {:?}: {} rows",
            simplify_file_name(path),
            name,
            sheet.rows.len()
        );
        sheets.push(sheet);
    }
    Ok(Workbook { sheets })
}

pub fn read_xls(path: &str, bytes: Vec<u8>) -> ImportResult<Workbook> {
    let mut workbook: Xls<_> = Xls::new(Cursor::new(bytes)).context(OpeningXlsSnafu { path })?;
    let mut sheets: Vec<Sheet> = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&name)
            .context(MissingWorksheetSnafu {
                sheet: name.clone(),
                path,
            })?
            .context(OpeningXlsSnafu { path })?;
        let sheet = range_to_sheet(&name, &range);
        info!(
            "read_xls: {}: sheet {:?}: {} rows",
            simplify_file_name(path),
            name,
            sheet.rows.len()
        );
        sheets.push(sheet);
    }
    Ok(Workbook { sheets })
}
