use std::path::Path;

/// The spreadsheet formats accepted for upload.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum FileKind {
    Xlsx,
    Xls,
    Csv,
}

impl FileKind {
    /// Judged on the extension only, before anything is read.
    pub fn from_path(path: &str) -> Option<FileKind> {
        let ext = Path::new(path).extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" => Some(FileKind::Xlsx),
            "xls" => Some(FileKind::Xls),
            "csv" => Some(FileKind::Csv),
            _ => None,
        }
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}
