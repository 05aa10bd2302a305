use snafu::OptionExt;

use crate::model::*;

impl CohortPolicy {
    /// Every cohort starts online.
    pub fn seed(cohorts: &[String]) -> CohortPolicy {
        CohortPolicy(
            cohorts
                .iter()
                .map(|c| (c.clone(), AccessMode::Online))
                .collect(),
        )
    }

    pub fn set(&mut self, cohort: &str, mode: AccessMode) -> PipelineResult<()> {
        let slot = self
            .0
            .get_mut(cohort)
            .context(UnknownCohortSnafu { cohort })?;
        *slot = mode;
        Ok(())
    }

    pub fn get(&self, cohort: &str) -> Option<AccessMode> {
        self.0.get(cohort).cloned()
    }

    pub fn cohorts(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn offline_cohorts(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, m)| **m == AccessMode::Offline)
            .map(|(c, _)| c.clone())
            .collect()
    }
}
