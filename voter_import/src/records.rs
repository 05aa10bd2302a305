use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::mapping::ColumnMapping;
use crate::model::*;

fn mapped_value(sheet: &Sheet, row: &[CellValue], column: Option<&str>) -> String {
    column
        .and_then(|c| sheet.column_index(c))
        .and_then(|idx| row.get(idx))
        .map(|cell| cell.to_string().trim().to_string())
        .unwrap_or_default()
}

/// Converts every row of the sheet into a typed record, in row order.
///
/// Rows are never dropped: a row missing its NIM or name is kept and marked invalid.
pub fn build_preview(sheet: &Sheet, mapping: &ColumnMapping) -> Vec<PreviewRecord> {
    sheet
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let voter_id = mapped_value(sheet, row, mapping.get(CanonicalField::Nim));
            let full_name = mapped_value(sheet, row, mapping.get(CanonicalField::Name));
            let email = mapped_value(sheet, row, mapping.get(CanonicalField::Email));
            let cohort = mapped_value(sheet, row, mapping.get(CanonicalField::Batch));
            let is_valid = !voter_id.is_empty() && !full_name.is_empty();
            if !is_valid {
                debug!("build_preview: row {} is invalid: {:?}", idx, row);
            }
            let payload = CanonicalPayload {
                nim: voter_id.clone(),
                name: full_name.clone(),
                email: email.clone(),
                batch: cohort.clone(),
            };
            PreviewRecord {
                sequence_index: idx,
                voter_id,
                full_name,
                email,
                cohort,
                is_valid,
                payload,
            }
        })
        .collect()
}

/// The distinct non-empty cohorts, sorted.
pub fn detect_cohorts(records: &[PreviewRecord]) -> Vec<String> {
    let cohorts: BTreeSet<&str> = records
        .iter()
        .map(|r| r.cohort.as_str())
        .filter(|c| !c.is_empty())
        .collect();
    cohorts.into_iter().map(|c| c.to_string()).collect()
}

/// Counts displayed next to the preview table.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PreviewSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub selected: usize,
    /// Voter ids appearing on more than one valid row, sorted.
    pub duplicate_voter_ids: Vec<String>,
}

impl PreviewSummary {
    pub fn compute(records: &[PreviewRecord], selected: usize) -> PreviewSummary {
        let valid = records.iter().filter(|r| r.is_valid).count();
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for r in records.iter().filter(|r| r.is_valid) {
            *seen.entry(r.voter_id.as_str()).or_insert(0) += 1;
        }
        let duplicate_voter_ids = seen
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id.to_string())
            .collect();
        PreviewSummary {
            total: records.len(),
            valid,
            invalid: records.len() - valid,
            selected,
            duplicate_voter_ids,
        }
    }
}
