use log::debug;
use snafu::ensure;

use crate::model::*;

/// Which header of the active sheet feeds each canonical field.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ColumnMapping {
    pub nim_column: Option<String>,
    pub name_column: Option<String>,
    pub email_column: Option<String>,
    pub batch_column: Option<String>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::Nim => self.nim_column.as_deref(),
            CanonicalField::Name => self.name_column.as_deref(),
            CanonicalField::Email => self.email_column.as_deref(),
            CanonicalField::Batch => self.batch_column.as_deref(),
        }
    }

    fn slot(&mut self, field: CanonicalField) -> &mut Option<String> {
        match field {
            CanonicalField::Nim => &mut self.nim_column,
            CanonicalField::Name => &mut self.name_column,
            CanonicalField::Email => &mut self.email_column,
            CanonicalField::Batch => &mut self.batch_column,
        }
    }

    /// Operator override. The header must belong to the sheet, and only the
    /// optional fields may be cleared.
    pub fn set(
        &mut self,
        sheet: &Sheet,
        field: CanonicalField,
        column: Option<&str>,
    ) -> PipelineResult<()> {
        match column {
            Some(c) => {
                ensure!(
                    sheet.has_column(c),
                    UnknownColumnSnafu {
                        column: c,
                        sheet: sheet.name.clone()
                    }
                );
                *self.slot(field) = Some(c.to_string());
            }
            None => {
                ensure!(!field.is_required(), RequiredColumnSnafu { field });
                *self.slot(field) = None;
            }
        }
        Ok(())
    }

    /// The required fields that are still unset, in field order.
    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .iter()
            .filter(|f| f.is_required() && self.get(**f).is_none())
            .cloned()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }
}

fn header_matches(header: &str, field: CanonicalField) -> bool {
    let lower = header.to_lowercase();
    field.keywords().iter().any(|k| lower.contains(k))
}

/// Proposes a mapping from the headers of a sheet.
///
/// Headers are scanned in sheet order and a field goes to the first header
/// matching its keywords. A header fills at most one field: when it matches
/// several fields that are still free, the last one in the order
/// NIM, Name, Email, Batch takes it.
pub fn detect_mapping(headers: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();
    for header in headers {
        let claimed = CanonicalField::ALL
            .iter()
            .filter(|f| mapping.get(**f).is_none() && header_matches(header, **f))
            .last()
            .cloned();
        if let Some(field) = claimed {
            debug!("detect_mapping: header {:?} -> {}", header, field);
            *mapping.slot(field) = Some(header.clone());
        }
    }
    mapping
}
