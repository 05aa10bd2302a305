use std::collections::BTreeSet;

use snafu::{ensure, OptionExt};

use crate::model::*;

/// Indices of the records that are going to be submitted.
///
/// Invariant: only indices of valid records are ever present. The filter of the
/// preview list never changes this set by itself.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SelectionSet {
    selected: BTreeSet<usize>,
}

/// The indices shown for a filter: case-insensitive match on the NIM or the name.
pub fn visible_ids(records: &[PreviewRecord], filter: &str) -> Vec<usize> {
    let needle = filter.trim().to_lowercase();
    records
        .iter()
        .filter(|r| {
            needle.is_empty()
                || r.voter_id.to_lowercase().contains(&needle)
                || r.full_name.to_lowercase().contains(&needle)
        })
        .map(|r| r.sequence_index)
        .collect()
}

fn visible_valid(records: &[PreviewRecord], filter: &str) -> Vec<usize> {
    visible_ids(records, filter)
        .into_iter()
        .filter(|idx| records.get(*idx).map(|r| r.is_valid).unwrap_or(false))
        .collect()
}

impl SelectionSet {
    /// All the valid records.
    pub fn all_valid(records: &[PreviewRecord]) -> SelectionSet {
        SelectionSet {
            selected: records
                .iter()
                .filter(|r| r.is_valid)
                .map(|r| r.sequence_index)
                .collect(),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.selected.iter().cloned().collect()
    }

    /// Flips one record. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, records: &[PreviewRecord], index: usize) -> PipelineResult<bool> {
        let record = records.get(index).context(UnknownRecordSnafu { index })?;
        ensure!(record.is_valid, InvalidRecordSnafu { index });
        if self.selected.remove(&index) {
            Ok(false)
        } else {
            self.selected.insert(index);
            Ok(true)
        }
    }

    /// Selects or deselects the visible valid records. Records hidden by the
    /// filter keep their state.
    pub fn set_visible(&mut self, records: &[PreviewRecord], filter: &str, on: bool) {
        for idx in visible_valid(records, filter) {
            if on {
                self.selected.insert(idx);
            } else {
                self.selected.remove(&idx);
            }
        }
    }

    /// True when there is at least one visible valid record and all of them are selected.
    pub fn all_visible_selected(&self, records: &[PreviewRecord], filter: &str) -> bool {
        let visible = visible_valid(records, filter);
        !visible.is_empty() && visible.iter().all(|idx| self.selected.contains(idx))
    }

    /// The "select all" checkbox of the preview table.
    pub fn toggle_all_visible(&mut self, records: &[PreviewRecord], filter: &str) {
        let on = !self.all_visible_selected(records, filter);
        self.set_visible(records, filter, on);
    }
}
