//! Placing tagged trial outcomes into the result array.
//!
//! The assembler owns the array and is only touched from the coordinating
//! thread. Every write is addressed by the task's own coordinates, so the
//! final contents do not depend on the order outcomes arrive in.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::array::ResultArray;
use crate::error::{TrialFailure, TrialFailureKind};
use crate::grid::ParameterGrid;
use crate::model::{ResultSchema, StudyMetadata, TaskDescriptor, TaskId, TrialResult};
use crate::study::StudyResult;
use crate::trial::TrialOutcome;

/// Where the result schema came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaSource {
    /// Passed in before the run
    Declared,
    /// Locked from the first successful task
    Inferred(TaskId),
    /// No trial succeeded and nothing was declared
    None,
}

pub struct ResultAssembler {
    grid: ParameterGrid,
    repetitions: usize,
    array: Option<ResultArray>,
    schema_source: SchemaSource,
    failures: Vec<TrialFailure>,
    ingested: usize,
    started: Instant,
}

impl ResultAssembler {
    /// With a declared schema the array is allocated immediately; otherwise it
    /// is allocated on the first success.
    #[must_use]
    pub fn new(grid: ParameterGrid, repetitions: usize, schema: Option<ResultSchema>) -> Self {
        let (array, schema_source) = match schema {
            Some(schema) => (
                Some(ResultArray::missing(grid.clone(), Some(repetitions), schema)),
                SchemaSource::Declared,
            ),
            None => (None, SchemaSource::None),
        };
        Self {
            grid,
            repetitions,
            array,
            schema_source,
            failures: Vec::new(),
            ingested: 0,
            started: Instant::now(),
        }
    }

    /// Record one task's outcome
    pub fn ingest(&mut self, task: &TaskDescriptor, outcome: Result<TrialResult, TrialFailure>) {
        self.ingested += 1;
        let result = match outcome {
            Ok(result) => result,
            Err(failure) => {
                self.record_failure(failure);
                return;
            }
        };

        if self.array.is_none() {
            match ResultSchema::from_result(&result) {
                Ok(schema) => {
                    tracing::debug!(task = task.id.0, fields = ?schema.fields(), "Schema locked");
                    self.array = Some(ResultArray::missing(
                        self.grid.clone(),
                        Some(self.repetitions),
                        schema,
                    ));
                    self.schema_source = SchemaSource::Inferred(task.id);
                }
                Err(kind) => {
                    self.record_failure(TrialFailure::new(task, kind));
                    return;
                }
            }
        }

        let Some(array) = self.array.as_mut() else {
            return;
        };
        match array.schema().align(&result) {
            Ok(values) => array.set_trial(&task.combination, task.repetition, &values),
            Err(kind) => self.record_failure(TrialFailure::new(task, kind)),
        }
    }

    pub fn ingest_outcome(&mut self, outcome: TrialOutcome) {
        self.ingest(&outcome.task, outcome.result);
    }

    /// Ingest a batch in task-id order, whatever order it was collected in
    pub fn ingest_all(&mut self, outcomes: impl IntoIterator<Item = TrialOutcome>) {
        let mut outcomes: Vec<TrialOutcome> = outcomes.into_iter().collect();
        outcomes.sort_by_key(|o| o.task.id);
        for outcome in outcomes {
            self.ingest_outcome(outcome);
        }
    }

    fn record_failure(&mut self, failure: TrialFailure) {
        tracing::debug!(
            task = failure.task.0,
            combination = %failure.combination,
            repetition = failure.repetition,
            reason = %failure.kind,
            "Trial failed"
        );
        self.failures.push(failure);
    }

    #[must_use]
    pub fn failures(&self) -> &[TrialFailure] {
        &self.failures
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn schema(&self) -> Option<&ResultSchema> {
        self.array.as_ref().map(ResultArray::schema)
    }

    #[must_use]
    pub fn schema_source(&self) -> SchemaSource {
        self.schema_source
    }

    /// Copy of the failures sorted by task
    #[must_use]
    pub fn sorted_failures(&self) -> Vec<TrialFailure> {
        let mut failures = self.failures.clone();
        failures.sort_by_key(|f| f.task);
        failures
    }

    /// Finish the run. `raw` keeps the repetition axis; otherwise repetitions
    /// collapse to the mean of their successful values.
    #[must_use]
    pub fn finalize(self, raw: bool) -> StudyResult {
        let failure_count = self.failures.len();
        let total_trials = self.ingested;

        let array = self.array.unwrap_or_else(|| {
            ResultArray::missing(
                self.grid.clone(),
                Some(self.repetitions),
                ResultSchema::empty(),
            )
        });

        if total_trials > 0 && failure_count == total_trials {
            tracing::warn!(trials = total_trials, "Every trial failed");
        } else if failure_count > 0 {
            tracing::warn!(
                failures = failure_count,
                trials = total_trials,
                "Some trials failed; their cells are missing"
            );
        }

        let array = if raw { array } else { array.collapse_mean() };
        let missing_cells = if raw { 0 } else { array.missing_count() };
        if missing_cells > 0 {
            tracing::warn!(
                cells = missing_cells,
                "Collapsed cells without any successful repetition"
            );
        }

        let metadata = StudyMetadata {
            param_names: self.grid.names().map(str::to_string).collect(),
            param_sizes: self.grid.shape(),
            repetitions: self.repetitions,
            fields: array.schema().fields().to_vec(),
            raw,
            degree: 1,
            total_trials,
            failure_count,
            missing_cells,
            elapsed: self.started.elapsed(),
        };

        StudyResult { array, metadata }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CombinationIndex;

    fn task(id: usize, combination: Vec<usize>, repetition: usize) -> TaskDescriptor {
        TaskDescriptor {
            id: TaskId(id),
            combination: CombinationIndex(combination),
            repetition,
        }
    }

    #[test]
    fn test_schema_locks_on_first_success() {
        let grid = ParameterGrid::new().with("n", [1, 2]);
        let mut assembler = ResultAssembler::new(grid, 1, None);
        let t0 = task(0, vec![0], 0);
        assembler.ingest(
            &t0,
            Err(TrialFailure::new(&t0, TrialFailureKind::Error("x".into()))),
        );
        assert_eq!(assembler.schema(), None);

        assembler.ingest(&task(1, vec![1], 0), Ok(TrialResult::single("mean", 2.0)));
        assert_eq!(assembler.schema_source(), SchemaSource::Inferred(TaskId(1)));
        assert_eq!(assembler.schema().map(ResultSchema::len), Some(1));
    }

    #[test]
    fn test_mismatched_fields_fail_the_cell() {
        let grid = ParameterGrid::new().with("n", [1, 2]);
        let schema = ResultSchema::new(["mean"]).unwrap();
        let mut assembler = ResultAssembler::new(grid, 1, Some(schema));
        assembler.ingest(&task(0, vec![0], 0), Ok(TrialResult::single("var", 1.0)));
        assembler.ingest(&task(1, vec![1], 0), Ok(TrialResult::single("mean", 3.0)));

        assert_eq!(assembler.failure_count(), 1);
        assert!(matches!(
            assembler.failures()[0].kind,
            TrialFailureKind::SchemaMismatch { .. }
        ));

        let result = assembler.finalize(true);
        assert_eq!(result.array.value(&[0], Some(0), 0), None);
        assert_eq!(result.array.value(&[1], Some(0), 0), Some(3.0));
        assert_eq!(result.metadata.failure_count, 1);
    }

    #[test]
    fn test_empty_result_counts_as_failure() {
        let grid = ParameterGrid::new().with("n", [1]);
        let mut assembler = ResultAssembler::new(grid, 1, None);
        assembler.ingest(&task(0, vec![0], 0), Ok(TrialResult::new()));
        assert_eq!(assembler.failures()[0].kind, TrialFailureKind::EmptyResult);
    }

    #[test]
    fn test_all_failed_without_schema_has_empty_field_axis() {
        let grid = ParameterGrid::new().with("n", [1, 2]);
        let mut assembler = ResultAssembler::new(grid, 2, None);
        for (id, (c, r)) in [(0, 0), (0, 1), (1, 0), (1, 1)].into_iter().enumerate() {
            let t = task(id, vec![c], r);
            assembler.ingest(&t, Err(TrialFailure::new(&t, TrialFailureKind::Panic("p".into()))));
        }
        let result = assembler.finalize(false);
        assert_eq!(result.array.shape(), &[2, 0]);
        assert!(result.metadata.all_failed());
        assert_eq!(result.metadata.fields, Vec::<String>::new());
    }

    #[test]
    fn test_collapse_counts_missing_cells() {
        let grid = ParameterGrid::new().with("n", [1, 2]);
        let mut assembler = ResultAssembler::new(grid, 2, None);
        assembler.ingest(&task(0, vec![0], 0), Ok(TrialResult::single("x", 1.0)));
        assembler.ingest(&task(1, vec![0], 1), Ok(TrialResult::single("x", 3.0)));
        let t2 = task(2, vec![1], 0);
        assembler.ingest(&t2, Err(TrialFailure::new(&t2, TrialFailureKind::Error("e".into()))));
        let t3 = task(3, vec![1], 1);
        assembler.ingest(&t3, Err(TrialFailure::new(&t3, TrialFailureKind::Error("e".into()))));

        let result = assembler.finalize(false);
        assert_eq!(result.array.value(&[0], None, 0), Some(2.0));
        assert_eq!(result.array.value(&[1], None, 0), None);
        assert_eq!(result.metadata.missing_cells, 1);
        assert_eq!(result.metadata.success_count(), 2);
    }
}
