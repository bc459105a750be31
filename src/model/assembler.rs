use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::options::AssemblyOptions;
use super::steps::{DerivedTable, StepInput};
use crate::error::{ModelWarning, StepError};
use crate::table::{RawTableSet, Table};

/// What happened to one derived table
#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    Built { rows: usize },
    Skipped(StepError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub table: DerivedTable,
    pub status: StepStatus,
}

/// Per-step results and recovered warnings of one model build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub steps: Vec<StepOutcome>,
    pub warnings: Vec<ModelWarning>,
}

impl BuildReport {
    pub fn built(&self) -> impl Iterator<Item = DerivedTable> + '_ {
        self.steps.iter().filter_map(|s| match s.status {
            StepStatus::Built { .. } => Some(s.table),
            StepStatus::Skipped(_) => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (DerivedTable, &StepError)> + '_ {
        self.steps.iter().filter_map(|s| match &s.status {
            StepStatus::Skipped(e) => Some((s.table, e)),
            StepStatus::Built { .. } => None,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.skipped().next().is_none() && self.warnings.is_empty()
    }
}

/// Compare resolved keys against raw keys. `None` when they agree or when
/// either table is unavailable.
pub fn check_key_consistency(raw_keys: Option<&Table>, resolved: Option<&Table>) -> Option<ModelWarning> {
    let (raw_keys, resolved) = (raw_keys?.len(), resolved?.len());
    (raw_keys != resolved).then_some(ModelWarning::ModelConsistency {
        raw_keys,
        resolved_keys: resolved,
    })
}

/// Runs the derivation steps in order over a raw table set
#[derive(Debug, Clone, Default)]
pub struct ModelAssembler {
    options: AssemblyOptions,
}

impl ModelAssembler {
    pub fn new(options: AssemblyOptions) -> Self {
        Self { options }
    }

    pub fn assemble(&self, raw: &RawTableSet) -> (BTreeMap<DerivedTable, Table>, BuildReport) {
        let mut derived = BTreeMap::new();
        let mut report = BuildReport::default();

        for table in DerivedTable::ALL {
            let input = StepInput {
                raw,
                derived: &derived,
                options: &self.options,
            };

            let status = match table.derive(&input) {
                Ok(built) => {
                    info!(table = table.name(), rows = built.len(), "derived table");
                    let rows = built.len();
                    derived.insert(table, built);
                    StepStatus::Built { rows }
                }
                Err(e) => {
                    debug!(table = table.name(), reason = %e, "skipping derived table");
                    StepStatus::Skipped(e)
                }
            };
            report.steps.push(StepOutcome { table, status });
        }

        if let Some(warning) = check_key_consistency(raw.get("key"), derived.get(&DerivedTable::Key)) {
            warn!("{}", warning);
            report.warnings.push(warning);
        }

        (derived, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::table::{Cell, Row};

    fn table_of(rows: usize) -> Table {
        let rows: Vec<Row> = (0..rows)
            .map(|i| Row::from([("key_id".to_string(), Cell::Integer(i as i64))]))
            .collect();
        Table::from_rows("t_key", &rows).unwrap()
    }

    #[test]
    fn test_key_consistency() {
        assert!(check_key_consistency(Some(&table_of(3)), Some(&table_of(3))).is_none());
        assert!(check_key_consistency(None, Some(&table_of(3))).is_none());
        assert!(check_key_consistency(Some(&table_of(3)), None).is_none());
        assert_eq!(
            check_key_consistency(Some(&table_of(3)), Some(&table_of(2))),
            Some(ModelWarning::ModelConsistency {
                raw_keys: 3,
                resolved_keys: 2
            })
        );
    }

    #[test]
    fn test_empty_raw_set_skips_every_step() {
        let (derived, report) = ModelAssembler::default().assemble(&RawTableSet::default());
        assert!(derived.is_empty());
        assert_eq!(report.steps.len(), DerivedTable::ALL.len());
        assert_eq!(report.built().count(), 0);
        assert!(!report.is_complete());

        let first = report.skipped().next().unwrap();
        assert_eq!(
            first,
            (
                DerivedTable::Class,
                &StepError::MissingRecordType {
                    record: "class".into()
                }
            )
        );
    }
}
