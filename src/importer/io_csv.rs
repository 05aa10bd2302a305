// Primitives for reading CSV files.

use voter_import::builder::SheetBuilder;

use crate::importer::{io_common::simplify_file_name, *};

/// The name given to the only sheet of a CSV file.
pub const CSV_SHEET_NAME: &str = "Sheet1";

const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Picks the delimiter that appears the most in the header line.
/// Ties go to the earliest candidate, and a line without any candidate is comma separated.
pub fn sniff_delimiter(contents: &[u8]) -> u8 {
    let header_line = contents.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let mut best = (b',', 0usize);
    for d in CANDIDATE_DELIMITERS {
        let count = header_line.iter().filter(|b| **b == d).count();
        if count > best.1 {
            best = (d, count);
        }
    }
    best.0
}

fn strip_bom(contents: &[u8]) -> &[u8] {
    contents.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(contents)
}

pub fn read_csv(path: &str, contents: &[u8], delimiter: Option<u8>) -> ImportResult<Workbook> {
    let contents = strip_bom(contents);
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(contents));
    debug!(
        "read_csv: {}: delimiter {:?}",
        simplify_file_name(path),
        delimiter as char
    );
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(contents);

    let mut builder = SheetBuilder::new(CSV_SHEET_NAME);
    // Excel often exports CSV in a legacy code page: invalid UTF-8 is replaced, not rejected.
    let mut lossy_lines = 0;
    for line_r in rdr.byte_records() {
        let line = line_r.context(ParsingCsvSnafu { path })?;
        let cells: Vec<String> = line
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect();
        if std::str::from_utf8(line.as_slice()).is_err() {
            lossy_lines += 1;
        }
        let cells: Vec<&str> = cells.iter().map(|c| c.as_str()).collect();
        builder.text_row(&cells);
    }
    if lossy_lines > 0 {
        warn!(
            "read_csv: {}: {} lines are not valid UTF-8, unknown characters were replaced",
            simplify_file_name(path),
            lossy_lines
        );
    }
    let sheet = builder.build();
    info!(
        "read_csv: {}: {} rows, headers {:?}",
        simplify_file_name(path),
        sheet.rows.len(),
        sheet.headers
    );
    Ok(Workbook {
        sheets: vec![sheet],
    })
}
