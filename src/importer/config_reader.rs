use crate::importer::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const TOKEN_ENV_VAR: &str = "PEMIRA_API_TOKEN";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColumnsConfig {
    pub nim: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub batch: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImportConfig {
    #[serde(rename = "inputPath")]
    pub input_path: Option<String>,
    pub endpoint: Option<String>,
    #[serde(rename = "apiToken")]
    pub api_token: Option<String>,
    #[serde(rename = "sheetName")]
    pub sheet_name: Option<String>,
    pub columns: Option<ColumnsConfig>,
    #[serde(rename = "batchConfig")]
    pub batch_config: Option<BTreeMap<String, String>>,
    #[serde(rename = "csvDelimiter")]
    pub csv_delimiter: Option<String>,
}

pub fn read_config(path: &str) -> ImportResult<ImportConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ImportConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

/// Relative paths of a configuration file are resolved against its directory.
pub fn config_root(config_path: Option<&str>) -> Option<PathBuf> {
    config_path
        .and_then(|p| Path::new(p).parent())
        .map(|p| p.to_path_buf())
}

/// Everything needed to run one import, once the command line and the
/// configuration file are merged.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Settings {
    pub input: Option<String>,
    pub sheet: Option<String>,
    /// Column overrides, in application order. `None` disables an optional column.
    pub columns: Vec<(CanonicalField, Option<String>)>,
    /// Batch policies, in application order: a later entry wins.
    pub cohort_modes: Vec<(String, AccessMode)>,
    pub filter: Option<String>,
    pub exclude: Vec<String>,
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub out: Option<String>,
    pub reference: Option<String>,
    pub dry_run: bool,
    pub csv_delimiter: Option<u8>,
}

fn column_choice(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| {
        let v = v.trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

fn parse_delimiter(d: &str) -> ImportResult<u8> {
    match d {
        "\\t" | "tab" => Ok(b'\t'),
        _ if d.len() == 1 && d.is_ascii() => Ok(d.as_bytes()[0]),
        _ => InvalidDelimiterSnafu { delimiter: d }.fail(),
    }
}

impl Settings {
    pub fn resolve(args: &Args, config: Option<&ImportConfig>) -> ImportResult<Settings> {
        let default_config = ImportConfig::default();
        let config = config.unwrap_or(&default_config);
        let file_columns = config.columns.clone().unwrap_or_default();

        let mut columns: Vec<(CanonicalField, Option<String>)> = Vec::new();
        let choices = [
            (CanonicalField::Nim, args.nim_column.clone(), file_columns.nim),
            (CanonicalField::Name, args.name_column.clone(), file_columns.name),
            (CanonicalField::Email, args.email_column.clone(), file_columns.email),
            (CanonicalField::Batch, args.batch_column.clone(), file_columns.batch),
        ];
        for (field, from_args, from_file) in choices {
            if let Some(choice) = column_choice(from_args.or(from_file)) {
                columns.push((field, choice));
            }
        }

        let mut cohort_modes: Vec<(String, AccessMode)> = Vec::new();
        for (cohort, mode) in config.batch_config.clone().unwrap_or_default() {
            let m: AccessMode = mode.parse().context(PipelineSnafu {})?;
            cohort_modes.push((cohort, m));
        }
        for cohort in args.online.iter() {
            cohort_modes.push((cohort.clone(), AccessMode::Online));
        }
        for cohort in args.offline.iter() {
            cohort_modes.push((cohort.clone(), AccessMode::Offline));
        }

        let csv_delimiter = match config.csv_delimiter.as_deref() {
            Some(d) => Some(parse_delimiter(d)?),
            None => None,
        };

        let token = args
            .token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
            .or_else(|| config.api_token.clone());

        Ok(Settings {
            input: args.input.clone().or_else(|| config.input_path.clone()),
            sheet: args.sheet.clone().or_else(|| config.sheet_name.clone()),
            columns,
            cohort_modes,
            filter: args.filter.clone().filter(|f| !f.trim().is_empty()),
            exclude: args.exclude.clone(),
            endpoint: args.endpoint.clone().or_else(|| config.endpoint.clone()),
            token,
            out: args.out.clone(),
            reference: args.reference.clone(),
            dry_run: args.dry_run,
            csv_delimiter,
        })
    }
}
