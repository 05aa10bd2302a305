// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// The raw content of a spreadsheet cell.
///
/// Readers convert their native cell types into this representation at the
/// boundary. Nothing past the normalizer sees these values.
#[derive(PartialEq, Debug, Clone)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl CellValue {
    /// True for a cell without any content. Whitespace counts as content.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            // Student ids are often stored as numbers: never print them as 1.1e8 or 110221001.0
            CellValue::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => {
                write!(f, "{}", *x as i64)
            }
            CellValue::Number(x) => write!(f, "{}", x),
            CellValue::Bool(true) => write!(f, "TRUE"),
            CellValue::Bool(false) => write!(f, "FALSE"),
            CellValue::Empty => Ok(()),
        }
    }
}

/// One tabular sheet.
///
/// Invariant: every row has exactly `headers.len()` cells, and headers are
/// unique and non-empty. Use the `SheetBuilder` to construct one.
#[derive(PartialEq, Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn has_column(&self, header: &str) -> bool {
        self.column_index(header).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The row at the given position, as (header, value) pairs in column order.
    pub fn row(&self, idx: usize) -> Option<Vec<(&str, &CellValue)>> {
        self.rows.get(idx).map(|cells| {
            self.headers
                .iter()
                .map(|h| h.as_str())
                .zip(cells.iter())
                .collect()
        })
    }
}

/// All the sheets found in one uploaded file, in file order.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// The four fields a roster column can be mapped to.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum CanonicalField {
    Nim,
    Name,
    Email,
    Batch,
}

impl CanonicalField {
    /// The fixed evaluation order used by detection.
    pub const ALL: [CanonicalField; 4] = [
        CanonicalField::Nim,
        CanonicalField::Name,
        CanonicalField::Email,
        CanonicalField::Batch,
    ];

    pub fn is_required(&self) -> bool {
        matches!(self, CanonicalField::Nim | CanonicalField::Name)
    }

    /// Lower-case fragments that identify a header for this field.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::Nim => &["nim", "nomor", "induk"],
            CanonicalField::Name => &["nama", "name"],
            CanonicalField::Email => &["email", "surel"],
            CanonicalField::Batch => &["angkatan", "batch", "tahun"],
        }
    }
}

impl Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanonicalField::Nim => write!(f, "NIM"),
            CanonicalField::Name => write!(f, "Name"),
            CanonicalField::Email => write!(f, "Email"),
            CanonicalField::Batch => write!(f, "Batch"),
        }
    }
}

// ******** Derived data structures *********

/// The record sent to the backend. The keys never depend on the source headers.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalPayload {
    #[serde(rename = "NIM")]
    pub nim: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Batch")]
    pub batch: String,
}

/// One normalized input row.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PreviewRecord {
    /// Position in the original row order. Used as the selection key.
    pub sequence_index: usize,
    pub voter_id: String,
    pub full_name: String,
    pub email: String,
    pub cohort: String,
    pub is_valid: bool,
    pub payload: CanonicalPayload,
}

/// How the voters of a cohort are allowed to vote.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Authenticates and votes through the public web flow.
    #[default]
    Online,
    /// Checked in and voted for manually at a physical station.
    Offline,
}

impl Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessMode::Online => write!(f, "online"),
            AccessMode::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for AccessMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> PipelineResult<AccessMode> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(AccessMode::Online),
            "offline" => Ok(AccessMode::Offline),
            _ => UnknownAccessModeSnafu { value: s }.fail(),
        }
    }
}

/// The access mode chosen for every detected cohort.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CohortPolicy(pub BTreeMap<String, AccessMode>);

// ******** Wire data structures *********

/// The body of the backend import call.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub students: Vec<CanonicalPayload>,
    #[serde(rename = "batchConfig")]
    pub batch_config: CohortPolicy,
}

/// The aggregate counts returned by the backend.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImportSummary {
    pub success: u64,
    pub errors: u64,
    pub total: u64,
}

impl ImportSummary {
    /// Some rows were rejected by the backend. This is still a successful call.
    pub fn is_partial(&self) -> bool {
        self.errors > 0
    }

    pub fn notice(&self) -> Notice {
        if self.is_partial() {
            Notice::warning(format!(
                "Import partially succeeded: {} imported, {} failed, {} total",
                self.success, self.errors, self.total
            ))
        } else {
            Notice::success(format!(
                "Import succeeded: {} of {} voters imported",
                self.success, self.total
            ))
        }
    }
}

// ******** User feedback *********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient message for the operator.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Notice {
        Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Notice {
        Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Notice {
        Notice {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Notice {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl From<&PipelineError> for Notice {
    fn from(e: &PipelineError) -> Notice {
        match e {
            // Transport details are logged, the operator only gets a generic message.
            PipelineError::Submission { .. } => {
                Notice::error("Failed to import voters, please try again")
            }
            PipelineError::EmptySheet { .. }
            | PipelineError::MappingIncomplete { .. }
            | PipelineError::NoSelection {} => Notice::warning(e.to_string()),
            _ => Notice::error(e.to_string()),
        }
    }
}

// ********* Errors **********

fn field_list(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

/// Failures reported by an `ImportBackend`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BackendError {
    #[snafu(display("Could not reach the import endpoint: {message}"))]
    Transport { message: String },
    #[snafu(display("The import endpoint answered with status {status}: {body}"))]
    Status { status: u16, body: String },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    #[snafu(display("The file does not contain any sheet"))]
    EmptyWorkbook {},
    #[snafu(display("Sheet {sheet} is empty"))]
    EmptySheet { sheet: String },
    #[snafu(display("No sheet named {sheet}"))]
    UnknownSheet { sheet: String },
    #[snafu(display("Column {column} does not exist in sheet {sheet}"))]
    UnknownColumn { column: String, sheet: String },
    #[snafu(display("The {field} column is required and cannot be cleared"))]
    RequiredColumn { field: CanonicalField },
    #[snafu(display("Please map the required columns: {}", field_list(missing)))]
    MappingIncomplete { missing: Vec<CanonicalField> },
    #[snafu(display("No batch {cohort} was detected in the file"))]
    UnknownCohort { cohort: String },
    #[snafu(display("Unknown access mode {value:?} (expected online or offline)"))]
    UnknownAccessMode { value: String },
    #[snafu(display("Row {index} does not exist"))]
    UnknownRecord { index: usize },
    #[snafu(display("Row {index} is missing its NIM or name and cannot be selected"))]
    InvalidRecord { index: usize },
    #[snafu(display("Select at least one voter to import"))]
    NoSelection {},
    #[snafu(display("Cannot {action} while at the {stage:?} stage"))]
    WrongStage {
        action: String,
        stage: crate::session::Stage,
    },
    #[snafu(display("A submission is already in progress"))]
    Busy {},
    #[snafu(display("Submission failed"))]
    Submission { source: BackendError },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_render_like_spreadsheets() {
        assert_eq!(CellValue::Number(110221001.0).to_string(), "110221001");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Bool(true).to_string(), "TRUE");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn whitespace_is_content() {
        assert!(CellValue::Empty.is_empty());
        assert!(CellValue::Text(String::new()).is_empty());
        assert!(!CellValue::Text("  ".to_string()).is_empty());
        assert!(!CellValue::Number(0.0).is_empty());
    }

    #[test]
    fn access_mode_parsing() {
        assert_eq!("Offline".parse::<AccessMode>().unwrap(), AccessMode::Offline);
        assert_eq!(" online ".parse::<AccessMode>().unwrap(), AccessMode::Online);
        assert!("remote".parse::<AccessMode>().is_err());
    }

    #[test]
    fn request_uses_canonical_keys() {
        let mut policy = CohortPolicy::default();
        policy.0.insert("2021".to_string(), AccessMode::Offline);
        let req = ImportRequest {
            students: vec![CanonicalPayload {
                nim: "0110221001".to_string(),
                name: "Budi".to_string(),
                email: "".to_string(),
                batch: "2021".to_string(),
            }],
            batch_config: policy,
        };
        let js = serde_json::to_value(&req).unwrap();
        assert_eq!(
            js,
            serde_json::json!({
                "students": [{"NIM": "0110221001", "Name": "Budi", "Email": "", "Batch": "2021"}],
                "batchConfig": {"2021": "offline"}
            })
        );
    }

    #[test]
    fn partial_summary_notice_reports_counts() {
        let s = ImportSummary {
            success: 8,
            errors: 2,
            total: 10,
        };
        assert!(s.is_partial());
        let n = s.notice();
        assert_eq!(n.level, NoticeLevel::Warning);
        assert!(n.message.contains('8'));
        assert!(n.message.contains('2'));
        assert!(n.message.contains("10"));
    }

    #[test]
    fn transport_errors_are_generic_for_operators() {
        let e = PipelineError::Submission {
            source: BackendError::Transport {
                message: "connection refused".to_string(),
            },
        };
        let n = Notice::from(&e);
        assert_eq!(n.level, NoticeLevel::Error);
        assert!(!n.message.contains("refused"));
    }
}
