use log::debug;

use crate::model::*;

/// A builder for sheets.
///
/// Readers feed it the raw grid of a sheet (header row first). It takes care of
/// the shape invariants of `Sheet`: headers are unique and non-empty, every row
/// has one cell per header, blank lines are dropped.
///
/// ```
/// use voter_import::builder::SheetBuilder;
/// use voter_import::CellValue;
///
/// let mut builder = SheetBuilder::new("Sheet1");
/// builder.header_row(&[
///     CellValue::Text("NIM".to_string()),
///     CellValue::Text("Nama".to_string()),
/// ]);
/// builder.data_row(&[CellValue::Number(110221001.0), CellValue::Text("Budi".to_string())]);
/// let sheet = builder.build();
/// assert_eq!(sheet.headers, vec!["NIM", "Nama"]);
/// assert_eq!(sheet.rows.len(), 1);
/// ```
pub struct SheetBuilder {
    name: String,
    headers: Vec<String>,
    // For each kept header, the column position in the source grid.
    positions: Vec<usize>,
    has_header: bool,
    rows: Vec<Vec<CellValue>>,
}

impl SheetBuilder {
    pub fn new(name: &str) -> SheetBuilder {
        SheetBuilder {
            name: name.to_string(),
            headers: Vec::new(),
            positions: Vec::new(),
            has_header: false,
            rows: Vec::new(),
        }
    }

    /// Sets the header row. Blank header cells are skipped, and only the
    /// first occurrence of a repeated header is kept.
    pub fn header_row(&mut self, cells: &[CellValue]) {
        self.headers.clear();
        self.positions.clear();
        self.has_header = true;
        for (pos, cell) in cells.iter().enumerate() {
            let h = cell.to_string().trim().to_string();
            if h.is_empty() {
                continue;
            }
            if self.headers.contains(&h) {
                debug!(
                    "SheetBuilder: sheet {:?}: dropping duplicate header {:?} at column {}",
                    self.name, h, pos
                );
                continue;
            }
            self.headers.push(h);
            self.positions.push(pos);
        }
    }

    /// Adds a data row. Missing trailing cells become empty cells.
    ///
    /// A line is skipped only when all its source cells are empty, including
    /// the cells under blank or repeated headers.
    pub fn data_row(&mut self, cells: &[CellValue]) {
        if cells.iter().all(|c| c.is_empty()) {
            return;
        }
        let row: Vec<CellValue> = self
            .positions
            .iter()
            .map(|pos| cells.get(*pos).cloned().unwrap_or(CellValue::Empty))
            .collect();
        if row.iter().all(|c| c.is_empty()) {
            debug!(
                "SheetBuilder: sheet {:?}: line {} only has content outside the kept columns",
                self.name,
                self.rows.len() + 1
            );
        }
        self.rows.push(row);
    }

    /// Convenience for grids that are already text.
    pub fn text_row(&mut self, cells: &[&str]) {
        let cs: Vec<CellValue> = cells
            .iter()
            .map(|s| {
                if s.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(s.to_string())
                }
            })
            .collect();
        if !self.has_header {
            self.header_row(&cs);
        } else {
            self.data_row(&cs);
        }
    }

    pub fn build(self) -> Sheet {
        Sheet {
            name: self.name,
            headers: self.headers,
            rows: self.rows,
        }
    }
}

/// Builds a sheet out of a grid of strings, the first line being the header.
pub fn sheet_from_text(name: &str, grid: &[&[&str]]) -> Sheet {
    let mut builder = SheetBuilder::new(name);
    for line in grid {
        builder.text_row(line);
    }
    builder.build()
}
