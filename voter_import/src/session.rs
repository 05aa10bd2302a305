use log::{debug, info, warn};
use snafu::{ensure, OptionExt, ResultExt};

use crate::mapping::{detect_mapping, ColumnMapping};
use crate::model::*;
use crate::records::{build_preview, detect_cohorts, PreviewSummary};
use crate::selection::{visible_ids, SelectionSet};

/// The steps of an import, in order.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Stage {
    /// No usable sheet yet. A workbook may already be loaded if its active sheet is empty.
    Upload,
    Mapping,
    /// Skipped when no cohort was detected.
    BatchConfig,
    Preview,
}

/// Outcome of activating a sheet.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SheetStatus {
    Ready { rows: usize },
    /// The pipeline did not advance. Another sheet may be picked.
    Empty,
}

/// The seam to the backend import endpoint.
pub trait ImportBackend {
    fn import_voters(&self, request: &ImportRequest) -> Result<ImportSummary, BackendError>;
}

/// A request handed over to the transport.
///
/// It is tied to the session state it was built from: once the session is
/// closed or reset, completing it has no effect.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    generation: u64,
    pub request: ImportRequest,
}

/// One import dialog, from the upload to the submission.
///
/// Every operator action is a method; invalid actions leave the state untouched.
#[derive(Debug, Clone)]
pub struct ImportSession {
    stage: Stage,
    workbook: Option<Workbook>,
    active_sheet: Option<String>,
    mapping: ColumnMapping,
    records: Vec<PreviewRecord>,
    cohort_policy: CohortPolicy,
    selection: SelectionSet,
    filter: String,
    busy: bool,
    generation: u64,
}

impl Default for ImportSession {
    fn default() -> Self {
        ImportSession::new()
    }
}

impl ImportSession {
    pub fn new() -> ImportSession {
        ImportSession {
            stage: Stage::Upload,
            workbook: None,
            active_sheet: None,
            mapping: ColumnMapping::default(),
            records: Vec::new(),
            cohort_policy: CohortPolicy::default(),
            selection: SelectionSet::default(),
            filter: String::new(),
            busy: false,
            generation: 0,
        }
    }

    // ******** Accessors ********

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn workbook(&self) -> Option<&Workbook> {
        self.workbook.as_ref()
    }

    pub fn active_sheet(&self) -> Option<&Sheet> {
        let name = self.active_sheet.as_deref()?;
        self.workbook.as_ref()?.sheet(name)
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn records(&self) -> &[PreviewRecord] {
        &self.records
    }

    pub fn cohort_policy(&self) -> &CohortPolicy {
        &self.cohort_policy
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn summary(&self) -> PreviewSummary {
        PreviewSummary::compute(&self.records, self.selection.len())
    }

    fn check_stage(&self, action: &str, allowed: &[Stage]) -> PipelineResult<()> {
        ensure!(!self.busy, BusySnafu {});
        ensure!(
            allowed.contains(&self.stage),
            WrongStageSnafu {
                action,
                stage: self.stage
            }
        );
        Ok(())
    }

    /// Back to the initial state. Results of in-flight submissions are ignored afterwards.
    fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = ImportSession::new();
        self.generation = generation;
    }

    // ******** Upload and mapping ********

    /// Starts a new import with a freshly parsed file. Any previous state is discarded.
    pub fn load_workbook(&mut self, workbook: Workbook) -> PipelineResult<SheetStatus> {
        ensure!(!self.busy, BusySnafu {});
        let first = workbook
            .sheets
            .first()
            .map(|s| s.name.clone())
            .context(EmptyWorkbookSnafu {})?;
        info!(
            "load_workbook: {} sheet(s): {:?}",
            workbook.sheets.len(),
            workbook.sheet_names()
        );
        self.reset();
        self.workbook = Some(workbook);
        self.activate(&first)
    }

    /// Switches the active sheet. Detection runs again and manual overrides are lost.
    pub fn select_sheet(&mut self, name: &str) -> PipelineResult<SheetStatus> {
        self.check_stage("select a sheet", &[Stage::Upload, Stage::Mapping])?;
        let workbook = self.workbook.as_ref().context(EmptyWorkbookSnafu {})?;
        ensure!(
            workbook.sheet(name).is_some(),
            UnknownSheetSnafu { sheet: name }
        );
        self.activate(name)
    }

    fn activate(&mut self, name: &str) -> PipelineResult<SheetStatus> {
        let sheet = self
            .workbook
            .as_ref()
            .and_then(|wb| wb.sheet(name))
            .context(UnknownSheetSnafu { sheet: name })?;
        let mapping = detect_mapping(&sheet.headers);
        let rows = sheet.rows.len();
        debug!("activate: sheet {:?}: detected mapping {:?}", name, mapping);
        self.active_sheet = Some(name.to_string());
        self.mapping = mapping;
        if rows == 0 {
            warn!("activate: sheet {:?} has no data rows", name);
            self.stage = Stage::Upload;
            Ok(SheetStatus::Empty)
        } else {
            info!("activate: sheet {:?} with {} rows", name, rows);
            self.stage = Stage::Mapping;
            Ok(SheetStatus::Ready { rows })
        }
    }

    pub fn set_column(&mut self, field: CanonicalField, column: Option<&str>) -> PipelineResult<()> {
        self.check_stage("change the column mapping", &[Stage::Mapping])?;
        let sheet = self
            .active_sheet
            .as_deref()
            .and_then(|name| self.workbook.as_ref()?.sheet(name))
            .context(EmptyWorkbookSnafu {})?;
        self.mapping.set(sheet, field, column)?;
        debug!("set_column: {} -> {:?}", field, column);
        Ok(())
    }

    /// Normalizes the rows with the current mapping and moves to the cohort stage,
    /// or straight to the preview when there is no cohort.
    pub fn apply_mapping(&mut self) -> PipelineResult<Stage> {
        self.check_stage("apply the column mapping", &[Stage::Mapping])?;
        let sheet = self.active_sheet().context(EmptyWorkbookSnafu {})?;
        ensure!(
            !sheet.is_empty(),
            EmptySheetSnafu {
                sheet: sheet.name.clone()
            }
        );
        let missing = self.mapping.missing_required();
        ensure!(missing.is_empty(), MappingIncompleteSnafu { missing });

        let records = build_preview(sheet, &self.mapping);
        let cohorts = detect_cohorts(&records);
        self.selection = SelectionSet::all_valid(&records);
        self.cohort_policy = CohortPolicy::seed(&cohorts);
        self.records = records;
        self.filter.clear();
        self.stage = if cohorts.is_empty() {
            Stage::Preview
        } else {
            Stage::BatchConfig
        };
        let summary = self.summary();
        info!(
            "apply_mapping: {} rows ({} valid, {} invalid), cohorts: {:?}",
            summary.total, summary.valid, summary.invalid, cohorts
        );
        if !summary.duplicate_voter_ids.is_empty() {
            warn!(
                "apply_mapping: NIM present on several rows: {:?}",
                summary.duplicate_voter_ids
            );
        }
        Ok(self.stage)
    }

    // ******** Cohorts ********

    pub fn set_cohort_mode(&mut self, cohort: &str, mode: AccessMode) -> PipelineResult<()> {
        self.check_stage("change a batch policy", &[Stage::BatchConfig, Stage::Preview])?;
        self.cohort_policy.set(cohort, mode)?;
        debug!("set_cohort_mode: {} -> {}", cohort, mode);
        Ok(())
    }

    pub fn confirm_cohorts(&mut self) -> PipelineResult<()> {
        self.check_stage("confirm the batch policies", &[Stage::BatchConfig])?;
        self.stage = Stage::Preview;
        Ok(())
    }

    /// One step back. Going back to the mapping keeps the mapping but the
    /// records are rebuilt on the next apply.
    pub fn back(&mut self) -> PipelineResult<Stage> {
        self.check_stage("go back", &[Stage::BatchConfig, Stage::Preview])?;
        self.stage = match self.stage {
            Stage::Preview if !self.cohort_policy.is_empty() => Stage::BatchConfig,
            _ => Stage::Mapping,
        };
        Ok(self.stage)
    }

    // ******** Selection ********

    pub fn set_filter(&mut self, filter: &str) {
        self.filter = filter.to_string();
    }

    pub fn visible_records(&self) -> Vec<&PreviewRecord> {
        visible_ids(&self.records, &self.filter)
            .into_iter()
            .filter_map(|idx| self.records.get(idx))
            .collect()
    }

    pub fn toggle_record(&mut self, index: usize) -> PipelineResult<bool> {
        self.check_stage("change the selection", &[Stage::Preview])?;
        self.selection.toggle(&self.records, index)
    }

    pub fn toggle_all_visible(&mut self) -> PipelineResult<()> {
        self.check_stage("change the selection", &[Stage::Preview])?;
        self.selection
            .toggle_all_visible(&self.records, self.filter.as_str());
        Ok(())
    }

    pub fn set_visible_selected(&mut self, on: bool) -> PipelineResult<()> {
        self.check_stage("change the selection", &[Stage::Preview])?;
        self.selection
            .set_visible(&self.records, self.filter.as_str(), on);
        Ok(())
    }

    // ******** Submission ********

    /// The payload that would be sent, in original row order.
    pub fn build_request(&self) -> PipelineResult<ImportRequest> {
        ensure!(
            self.stage == Stage::Preview,
            WrongStageSnafu {
                action: "submit",
                stage: self.stage
            }
        );
        ensure!(!self.selection.is_empty(), NoSelectionSnafu {});
        let students: Vec<CanonicalPayload> = self
            .selection
            .indices()
            .iter()
            .filter_map(|idx| self.records.get(*idx))
            .map(|r| r.payload.clone())
            .collect();
        Ok(ImportRequest {
            students,
            batch_config: self.cohort_policy.clone(),
        })
    }

    /// Hands the request over. The session is busy until `complete_submission`.
    pub fn begin_submission(&mut self) -> PipelineResult<PendingSubmission> {
        ensure!(!self.busy, BusySnafu {});
        let request = self.build_request()?;
        self.busy = true;
        info!(
            "begin_submission: {} voters, batch config {:?}",
            request.students.len(),
            request.batch_config
        );
        Ok(PendingSubmission {
            generation: self.generation,
            request,
        })
    }

    /// Records the transport outcome.
    ///
    /// A response for a session that was closed in the meantime is ignored and
    /// gives `Ok(None)`. A transport failure keeps everything so the operator
    /// can submit again. Any response resets the session.
    pub fn complete_submission(
        &mut self,
        pending: PendingSubmission,
        result: Result<ImportSummary, BackendError>,
    ) -> PipelineResult<Option<ImportSummary>> {
        if pending.generation != self.generation {
            debug!(
                "complete_submission: ignoring stale result (generation {} != {})",
                pending.generation, self.generation
            );
            return Ok(None);
        }
        self.busy = false;
        match result {
            Ok(summary) => {
                info!("complete_submission: {:?}", summary);
                self.reset();
                Ok(Some(summary))
            }
            Err(e) => {
                warn!("complete_submission: submission failed: {}", e);
                Err(e).context(SubmissionSnafu {})
            }
        }
    }

    pub fn submit<B: ImportBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> PipelineResult<Option<ImportSummary>> {
        let pending = self.begin_submission()?;
        let result = backend.import_voters(&pending.request);
        self.complete_submission(pending, result)
    }

    /// Closes the dialog.
    pub fn close(&mut self) {
        info!("close: discarding import session");
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::sheet_from_text;
    use std::cell::RefCell;

    struct FakeBackend {
        response: Result<ImportSummary, String>,
        calls: RefCell<Vec<ImportRequest>>,
    }

    impl FakeBackend {
        fn answering(success: u64, errors: u64) -> FakeBackend {
            FakeBackend {
                response: Ok(ImportSummary {
                    success,
                    errors,
                    total: success + errors,
                }),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> FakeBackend {
            FakeBackend {
                response: Err("connection reset".to_string()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ImportBackend for FakeBackend {
        fn import_voters(&self, request: &ImportRequest) -> Result<ImportSummary, BackendError> {
            self.calls.borrow_mut().push(request.clone());
            match &self.response {
                Ok(s) => Ok(*s),
                Err(message) => Err(BackendError::Transport {
                    message: message.clone(),
                }),
            }
        }
    }

    fn roster() -> Workbook {
        Workbook {
            sheets: vec![
                sheet_from_text("Kosong", &[&["NIM", "Nama"]]),
                sheet_from_text(
                    "Pemilih",
                    &[
                        &["Nomor Induk", "Nama Lengkap", "Surel", "Angkatan"],
                        &["0110221001", "Budi", "budi@x.com", "2021"],
                        &["", "Siti", "siti@x.com", "2021"],
                        &["0110222001", "Andi", "", "2022"],
                    ],
                ),
                sheet_from_text("Tanpa Angkatan", &[&["ID", "Siswa"], &["1", "A"], &["2", "B"]]),
            ],
        }
    }

    fn at_preview() -> ImportSession {
        let mut session = ImportSession::new();
        session.load_workbook(roster()).unwrap();
        session.select_sheet("Pemilih").unwrap();
        assert_eq!(session.apply_mapping().unwrap(), Stage::BatchConfig);
        session.confirm_cohorts().unwrap();
        session
    }

    #[test]
    fn empty_first_sheet_does_not_advance() {
        let mut session = ImportSession::new();
        assert_eq!(session.load_workbook(roster()).unwrap(), SheetStatus::Empty);
        assert_eq!(session.stage(), Stage::Upload);
        assert_eq!(session.active_sheet().unwrap().name, "Kosong");
        assert_eq!(
            session.select_sheet("Pemilih").unwrap(),
            SheetStatus::Ready { rows: 3 }
        );
        assert_eq!(session.stage(), Stage::Mapping);
    }

    #[test]
    fn workbook_without_sheets_is_rejected() {
        let mut session = ImportSession::new();
        assert!(matches!(
            session.load_workbook(Workbook::default()),
            Err(PipelineError::EmptyWorkbook {})
        ));
        assert_eq!(session.stage(), Stage::Upload);
        assert!(session.workbook().is_none());
    }

    #[test]
    fn switching_sheets_discards_overrides() {
        let mut session = ImportSession::new();
        session.load_workbook(roster()).unwrap();
        session.select_sheet("Pemilih").unwrap();
        session
            .set_column(CanonicalField::Email, None)
            .unwrap();
        session
            .set_column(CanonicalField::Batch, Some("Surel"))
            .unwrap();
        session.select_sheet("Tanpa Angkatan").unwrap();
        session.select_sheet("Pemilih").unwrap();
        assert_eq!(session.mapping().email_column.as_deref(), Some("Surel"));
        assert_eq!(session.mapping().batch_column.as_deref(), Some("Angkatan"));
    }

    #[test]
    fn incomplete_mapping_blocks_the_pipeline() {
        let mut session = ImportSession::new();
        session.load_workbook(roster()).unwrap();
        session.select_sheet("Tanpa Angkatan").unwrap();
        match session.apply_mapping() {
            Err(PipelineError::MappingIncomplete { missing }) => {
                assert_eq!(missing, vec![CanonicalField::Nim, CanonicalField::Name])
            }
            x => panic!("unexpected {:?}", x),
        }
        assert_eq!(session.stage(), Stage::Mapping);
        session.set_column(CanonicalField::Nim, Some("ID")).unwrap();
        session.set_column(CanonicalField::Name, Some("Siswa")).unwrap();
        // No cohort column: the batch stage is skipped.
        assert_eq!(session.apply_mapping().unwrap(), Stage::Preview);
        assert!(session.cohort_policy().is_empty());
        assert_eq!(session.build_request().unwrap().students.len(), 2);
    }

    #[test]
    fn selection_starts_with_the_valid_rows() {
        let session = at_preview();
        assert_eq!(session.records().len(), 3);
        assert_eq!(session.selection().indices(), vec![0, 2]);
        assert!(matches!(
            session.clone().toggle_record(1),
            Err(PipelineError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn batch_config_is_sent_with_the_selected_rows() {
        let mut session = ImportSession::new();
        session.load_workbook(roster()).unwrap();
        session.select_sheet("Pemilih").unwrap();
        session.apply_mapping().unwrap();
        assert_eq!(session.cohort_policy().cohorts(), vec!["2021", "2022"]);
        session.set_cohort_mode("2021", AccessMode::Offline).unwrap();
        session.confirm_cohorts().unwrap();

        let req = session.build_request().unwrap();
        assert_eq!(req.students.len(), 2);
        assert_eq!(req.students[0].nim, "0110221001");
        assert_eq!(req.students[1].batch, "2022");
        assert_eq!(req.batch_config.get("2021"), Some(AccessMode::Offline));
        assert_eq!(req.batch_config.get("2022"), Some(AccessMode::Online));
    }

    #[test]
    fn empty_selection_is_not_submitted() {
        let mut session = at_preview();
        session.toggle_all_visible().unwrap();
        assert!(session.selection().is_empty());
        let backend = FakeBackend::answering(1, 0);
        assert!(matches!(
            session.submit(&backend),
            Err(PipelineError::NoSelection {})
        ));
        assert!(backend.calls.borrow().is_empty());
        assert!(!session.is_busy());
    }

    #[test]
    fn partial_import_resets_the_session() {
        let mut session = at_preview();
        let backend = FakeBackend::answering(8, 2);
        let summary = session.submit(&backend).unwrap().unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                success: 8,
                errors: 2,
                total: 10
            }
        );
        assert!(summary.is_partial());
        assert_eq!(backend.calls.borrow().len(), 1);
        assert_eq!(session.stage(), Stage::Upload);
        assert!(session.workbook().is_none());
        assert!(session.records().is_empty());
    }

    #[test]
    fn transport_failure_keeps_the_session() {
        env_logger::try_init().ok();
        let mut session = at_preview();
        let records_before = session.records().to_vec();
        let selection_before = session.selection().clone();

        let failing = FakeBackend::failing();
        assert!(matches!(
            session.submit(&failing),
            Err(PipelineError::Submission { .. })
        ));
        assert_eq!(session.stage(), Stage::Preview);
        assert_eq!(session.records(), records_before.as_slice());
        assert_eq!(session.selection(), &selection_before);
        assert!(!session.is_busy());

        // Retry without uploading again.
        let backend = FakeBackend::answering(2, 0);
        assert!(session.submit(&backend).unwrap().is_some());
    }

    #[test]
    fn results_after_close_are_ignored() {
        let mut session = at_preview();
        let pending = session.begin_submission().unwrap();
        assert!(session.is_busy());
        assert!(matches!(session.back(), Err(PipelineError::Busy {})));
        session.close();
        let late = Ok(ImportSummary {
            success: 2,
            errors: 0,
            total: 2,
        });
        assert_eq!(session.complete_submission(pending, late).unwrap(), None);
        assert_eq!(session.stage(), Stage::Upload);
        assert!(!session.is_busy());
    }

    #[test]
    fn filter_does_not_change_the_selection() {
        let mut session = at_preview();
        session.set_filter("andi");
        let visible: Vec<usize> = session
            .visible_records()
            .iter()
            .map(|r| r.sequence_index)
            .collect();
        assert_eq!(visible, vec![2]);
        assert_eq!(session.selection().indices(), vec![0, 2]);
        session.toggle_all_visible().unwrap();
        assert_eq!(session.selection().indices(), vec![0]);
    }

    #[test]
    fn back_and_reapply_rebuilds_records() {
        let mut session = at_preview();
        session.toggle_record(0).unwrap();
        assert_eq!(session.back().unwrap(), Stage::BatchConfig);
        assert_eq!(session.back().unwrap(), Stage::Mapping);
        session
            .set_column(CanonicalField::Batch, None)
            .unwrap();
        assert_eq!(session.apply_mapping().unwrap(), Stage::Preview);
        assert_eq!(session.selection().indices(), vec![0, 2]);
        assert!(session.cohort_policy().is_empty());
    }
}
