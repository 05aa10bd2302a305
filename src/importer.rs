use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use voter_import::*;

use std::fs;
use std::path::Path;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::importer::client::HttpImportBackend;
use crate::importer::config_reader::*;
use crate::importer::io_common::FileKind;

mod client;
mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;

#[derive(Debug, Snafu)]
pub enum ImportError {
    #[snafu(display("No input file: pass --input or set inputPath in the configuration"))]
    MissingInput {},
    #[snafu(display("Unsupported file {path}: expected a .xlsx, .xls or .csv file"))]
    UnsupportedFile { path: String },
    #[snafu(display("Error reading file {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Error opening Excel 97-2003 file {path}"))]
    OpeningXls {
        source: calamine::XlsError,
        path: String,
    },
    #[snafu(display("Worksheet {sheet} could not be read in {path}"))]
    MissingWorksheet { sheet: String, path: String },
    #[snafu(display("Error parsing CSV file {path}"))]
    ParsingCsv { source: csv::Error, path: String },
    #[snafu(display("Invalid CSV delimiter {delimiter:?}: expected a single ASCII character"))]
    InvalidDelimiter { delimiter: String },
    #[snafu(display("Error opening JSON file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error serializing the import payload"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("No import endpoint: pass --endpoint, set it in the configuration or use --dry-run"))]
    MissingEndpoint {},
    #[snafu(display("Could not create the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("{source}"))]
    Pipeline { source: PipelineError },
    #[snafu(display("Difference detected between the generated payload and the reference payload"))]
    ReferenceMismatch {},
}

pub type ImportResult<T> = Result<T, ImportError>;

pub fn print_notice(notice: &Notice) {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    println!("[{}] {}", tag, notice.message);
}

pub fn read_workbook(path: &str, settings: &Settings) -> ImportResult<Workbook> {
    let kind = FileKind::from_path(path).context(UnsupportedFileSnafu { path })?;
    info!("Attempting to read {:?} file {:?}", kind, path);
    let bytes = fs::read(path).context(ReadingFileSnafu { path })?;
    let workbook = match kind {
        FileKind::Xlsx => io_excel::read_xlsx(path, bytes)?,
        FileKind::Xls => io_excel::read_xls(path, bytes)?,
        FileKind::Csv => io_csv::read_csv(path, &bytes, settings.csv_delimiter)?,
    };
    debug!("read_workbook: sheets: {:?}", workbook.sheet_names());
    Ok(workbook)
}

fn prepare_session(workbook: Workbook, settings: &Settings) -> ImportResult<ImportSession> {
    let mut session = ImportSession::new();
    let mut status = session.load_workbook(workbook).context(PipelineSnafu {})?;
    if let Some(sheet) = settings.sheet.as_deref() {
        status = session.select_sheet(sheet).context(PipelineSnafu {})?;
    }
    let sheet_name = session
        .active_sheet()
        .map(|s| s.name.clone())
        .unwrap_or_default();
    if status == SheetStatus::Empty {
        return Err(PipelineError::EmptySheet { sheet: sheet_name }).context(PipelineSnafu {});
    }

    for (field, column) in settings.columns.iter() {
        session
            .set_column(*field, column.as_deref())
            .context(PipelineSnafu {})?;
    }
    info!("Column mapping for sheet {:?}: {:?}", sheet_name, session.mapping());

    if session.apply_mapping().context(PipelineSnafu {})? == Stage::BatchConfig {
        for (cohort, mode) in settings.cohort_modes.iter() {
            match session.set_cohort_mode(cohort, *mode) {
                Ok(()) => {}
                Err(PipelineError::UnknownCohort { .. }) => {
                    warn!("Batch {} was not found in the file, ignoring its policy", cohort);
                }
                Err(e) => return Err(e).context(PipelineSnafu {}),
            }
        }
        session.confirm_cohorts().context(PipelineSnafu {})?;
    } else if !settings.cohort_modes.is_empty() {
        warn!("No batch detected in the file, ignoring the batch policies");
    }

    if let Some(filter) = settings.filter.as_deref() {
        // Only the filtered rows are kept.
        session.set_visible_selected(false).context(PipelineSnafu {})?;
        session.set_filter(filter);
        session.set_visible_selected(true).context(PipelineSnafu {})?;
        session.set_filter("");
    }
    for nim in settings.exclude.iter() {
        let indices: Vec<usize> = session
            .records()
            .iter()
            .filter(|r| r.voter_id == *nim && session.selection().contains(r.sequence_index))
            .map(|r| r.sequence_index)
            .collect();
        if indices.is_empty() {
            warn!("NIM {} is not part of the selection, cannot exclude it", nim);
        }
        for idx in indices {
            session.toggle_record(idx).context(PipelineSnafu {})?;
        }
    }
    Ok(session)
}

fn print_preview(session: &ImportSession) {
    for r in session.records() {
        let mark = match (r.is_valid, session.selection().contains(r.sequence_index)) {
            (false, _) => "invalid",
            (true, true) => "x",
            (true, false) => " ",
        };
        debug!(
            "{:>5} [{}] {:<16} {:<32} {:<32} {}",
            r.sequence_index + 1,
            mark,
            r.voter_id,
            r.full_name,
            r.email,
            r.cohort
        );
    }
    let summary = session.summary();
    println!(
        "rows: {}  valid: {}  invalid: {}  selected: {}",
        summary.total, summary.valid, summary.invalid, summary.selected
    );
    for (cohort, mode) in session.cohort_policy().0.iter() {
        println!("batch {}: {}", cohort, mode);
    }
    if !summary.duplicate_voter_ids.is_empty() {
        print_notice(&Notice::warning(format!(
            "NIM appearing on several rows: {}",
            summary.duplicate_voter_ids.join(", ")
        )));
    }
}

fn write_output(out: &str, contents: &str) -> ImportResult<()> {
    if out.is_empty() {
        debug!("write_output: no output requested");
        Ok(())
    } else if out == "stdout" {
        println!("{}", contents);
        Ok(())
    } else {
        info!("Writing payload to {:?}", out);
        fs::write(out, contents).context(WritingOutputSnafu { path: out })
    }
}

fn read_reference(path: &str) -> ImportResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

/// Both sides go through `JSValue` so that key order does not matter.
fn check_reference(path: &str, request: &ImportRequest) -> ImportResult<()> {
    let reference = read_reference(path)?;
    let payload = serde_json::to_value(request).context(SerializingJsonSnafu {})?;
    if reference != payload {
        warn!("Found differences with the reference payload");
        let pretty_reference =
            serde_json::to_string_pretty(&reference).context(SerializingJsonSnafu {})?;
        let pretty_payload =
            serde_json::to_string_pretty(&payload).context(SerializingJsonSnafu {})?;
        print_diff(pretty_reference.as_str(), pretty_payload.as_str(), "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    info!("Payload matches the reference {:?}", path);
    Ok(())
}

pub fn run_import(args: &Args) -> ImportResult<()> {
    let config = match args.config.as_deref() {
        Some(p) => Some(read_config(p)?),
        None => None,
    };
    let settings = Settings::resolve(args, config.as_ref())?;
    let input = settings.input.clone().context(MissingInputSnafu {})?;
    let input = match config_root(args.config.as_deref()) {
        Some(root) if Path::new(&input).is_relative() && args.input.is_none() => {
            root.join(&input).display().to_string()
        }
        _ => input,
    };

    let workbook = read_workbook(&input, &settings)?;
    let mut session = prepare_session(workbook, &settings)?;
    print_preview(&session);

    let request = session.build_request().context(PipelineSnafu {})?;
    let pretty_payload =
        serde_json::to_string_pretty(&request).context(SerializingJsonSnafu {})?;
    if let Some(out) = settings.out.as_deref() {
        write_output(out, &pretty_payload)?;
    }
    if let Some(reference) = settings.reference.as_deref() {
        check_reference(reference, &request)?;
    }

    if settings.dry_run {
        print_notice(&Notice::info(format!(
            "Dry run: {} voters ready to be imported",
            request.students.len()
        )));
        return Ok(());
    }

    let endpoint = settings.endpoint.clone().context(MissingEndpointSnafu {})?;
    let backend = HttpImportBackend::new(&endpoint, settings.token.clone())?;
    match session.submit(&backend).context(PipelineSnafu {})? {
        Some(summary) => print_notice(&summary.notice()),
        None => warn!("The import session was closed before the backend answered"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;
    use voter_import::builder::sheet_from_text;

    fn roster() -> Workbook {
        Workbook {
            sheets: vec![
                sheet_from_text("Kosong", &[&["NIM", "Nama"]]),
                sheet_from_text(
                    "Pemilih",
                    &[
                        &["NIM", "Nama", "Angkatan"],
                        &["0110221001", "Budi", "2021"],
                        &["0110221002", "Budiman", "2021"],
                        &["", "Siti", "2022"],
                        &["0110222001", "Andi", "2022"],
                    ],
                ),
            ],
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pemira-import-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn settings_drive_the_session() {
        let settings = Settings {
            sheet: Some("Pemilih".to_string()),
            cohort_modes: vec![
                ("2021".to_string(), AccessMode::Offline),
                ("2019".to_string(), AccessMode::Offline),
            ],
            filter: Some("budi".to_string()),
            exclude: vec!["0110221002".to_string()],
            ..Settings::default()
        };
        let session = prepare_session(roster(), &settings).unwrap();
        assert_eq!(session.stage(), Stage::Preview);
        let req = session.build_request().unwrap();
        assert_eq!(req.students.len(), 1);
        assert_eq!(req.students[0].nim, "0110221001");
        assert_eq!(req.batch_config.get("2021"), Some(AccessMode::Offline));
        assert_eq!(req.batch_config.get("2022"), Some(AccessMode::Online));
        assert_eq!(req.batch_config.get("2019"), None);
    }

    #[test]
    fn empty_sheet_stops_the_import() {
        let settings = Settings::default();
        match prepare_session(roster(), &settings) {
            Err(ImportError::Pipeline {
                source: PipelineError::EmptySheet { sheet },
            }) => assert_eq!(sheet, "Kosong"),
            Err(e) => panic!("unexpected error {:?}", e),
            Ok(_) => panic!("an empty sheet was accepted"),
        }
    }

    #[test]
    fn column_overrides_are_applied() {
        let settings = Settings {
            sheet: Some("Pemilih".to_string()),
            columns: vec![(CanonicalField::Batch, None)],
            ..Settings::default()
        };
        let session = prepare_session(roster(), &settings).unwrap();
        assert!(session.cohort_policy().is_empty());
        assert_eq!(session.build_request().unwrap().students.len(), 3);
    }

    #[test]
    fn unsupported_files_are_rejected_before_reading() {
        assert!(matches!(
            read_workbook("/nonexistent/pemilih.ods", &Settings::default()),
            Err(ImportError::UnsupportedFile { .. })
        ));
    }

    #[test]
    fn reference_comparison_ignores_key_order() {
        let dir = scratch_dir("reference");
        let request = ImportRequest {
            students: vec![CanonicalPayload {
                nim: "001".to_string(),
                name: "Budi".to_string(),
                email: "".to_string(),
                batch: "2021".to_string(),
            }],
            batch_config: CohortPolicy::seed(&["2021".to_string()]),
        };
        let ok_path = dir.join("ok.json");
        fs::write(
            &ok_path,
            r#"{"batchConfig": {"2021": "online"}, "students": [{"Batch": "2021", "Email": "", "Name": "Budi", "NIM": "001"}]}"#,
        )
        .unwrap();
        check_reference(ok_path.to_str().unwrap(), &request).unwrap();

        let bad_path = dir.join("bad.json");
        fs::write(&bad_path, r#"{"batchConfig": {}, "students": []}"#).unwrap();
        assert!(matches!(
            check_reference(bad_path.to_str().unwrap(), &request),
            Err(ImportError::ReferenceMismatch {})
        ));
    }

    #[test]
    fn dry_run_writes_the_payload() {
        let dir = scratch_dir("dry-run");
        let input = dir.join("pemilih.csv");
        fs::write(
            &input,
            "Nomor Induk;Nama Lengkap;Surel;Angkatan\n0110221001;Budi;budi@x.com;2021\n;Siti;;2021\n0110222001;Andi;;2022\n",
        )
        .unwrap();
        let out = dir.join("payload.json");
        let args = Args::parse_from(vec![
            "pemira-import",
            "--input",
            input.to_str().unwrap(),
            "--offline",
            "2021",
            "--out",
            out.to_str().unwrap(),
            "--dry-run",
        ]);
        run_import(&args).unwrap();

        let written: JSValue = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(
            written,
            serde_json::json!({
                "students": [
                    {"NIM": "0110221001", "Name": "Budi", "Email": "budi@x.com", "Batch": "2021"},
                    {"NIM": "0110222001", "Name": "Andi", "Email": "", "Batch": "2022"}
                ],
                "batchConfig": {"2021": "offline", "2022": "online"}
            })
        );
    }

    #[test]
    fn payload_errors_are_not_parsing_errors() {
        let err = serde_json::from_str::<JSValue>("{")
            .context(SerializingJsonSnafu {})
            .unwrap_err();
        assert!(matches!(err, ImportError::SerializingJson { .. }));
        assert_eq!(err.to_string(), "Error serializing the import payload");
    }

    #[test]
    fn empty_output_writes_nothing() {
        assert!(write_output("", "{}").is_ok());
        let dir = scratch_dir("empty-out");
        let input = dir.join("pemilih.csv");
        fs::write(&input, "NIM,Nama\n001,Budi\n").unwrap();
        let args = Args::parse_from(vec![
            "pemira-import",
            "--input",
            input.to_str().unwrap(),
            "--out",
            "",
            "--dry-run",
        ]);
        run_import(&args).unwrap();
    }

    #[test]
    fn submission_needs_an_endpoint() {
        let dir = scratch_dir("no-endpoint");
        let input = dir.join("pemilih.csv");
        fs::write(&input, "NIM,Nama\n001,Budi\n").unwrap();
        let args = Args::parse_from(vec!["pemira-import", "--input", input.to_str().unwrap()]);
        let settings = Settings::resolve(&args, None).unwrap();
        assert_eq!(settings.endpoint, None);
        assert!(matches!(
            run_import(&args),
            Err(ImportError::MissingEndpoint {})
        ));
    }
}
