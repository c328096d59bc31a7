use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CombinationIndex, ParamValue, TaskDescriptor, TaskId};

/// Error type trial functions may return. Anything boxed converts with `?`.
pub type TrialError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid study or table configuration, raised before any work happens
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("parameter grid has no parameters")]
    EmptyGrid,
    #[error("parameter `{0}` has no values")]
    EmptyParameter(String),
    #[error("parameter `{0}` is declared more than once")]
    DuplicateParameter(String),
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("parameter `{0}` is placed on the table axes more than once")]
    DuplicateAxis(String),
    #[error("unknown result field `{0}`")]
    UnknownField(String),
    #[error("result field `{0}` is declared more than once")]
    DuplicateField(String),
    #[error("result schema must name at least one field")]
    EmptySchema,
    #[error("grid size {size} exceeds the maximum of {max}")]
    GridTooLarge { size: usize, max: usize },
    #[error("grid size overflows (limit is {max})")]
    GridSizeOverflow { max: usize },
    #[error("repetitions must be at least 1")]
    ZeroRepetitions,
    #[error("degree of parallelism must be at least 1")]
    ZeroDegree,
    #[error("unknown reduction `{0}`")]
    UnknownReduction(String),
    #[error("unknown transform `{0}`")]
    UnknownTransform(String),
}

/// A pivot cell could not be resolved to exactly one array coordinate
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error(
        "parameter `{param}` is on neither axis and takes {count} values; \
         add it to rows or cols, or pin it with a one-value partial grid"
    )]
    Unresolved { param: String, count: usize },
    #[error("value {value} is not in the grid of parameter `{param}`")]
    UnknownValue { param: String, value: ParamValue },
    #[error("partial grid for `{0}` selects no values")]
    EmptySelection(String),
    #[error("identity reduction of field `{field}` saw {count} values; use a collapsing reduction")]
    NotScalar { field: String, count: usize },
}

/// Why a single trial produced no usable values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum TrialFailureKind {
    #[error("trial returned an error: {0}")]
    Error(String),
    #[error("trial panicked: {0}")]
    Panic(String),
    #[error("trial returned no result fields")]
    EmptyResult,
    #[error("result fields {found:?} do not match schema {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Per-cell failure with the context needed to find the bad draw again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("trial {} failed at combination {combination}, repetition {repetition}: {kind}", .task.0)]
pub struct TrialFailure {
    pub task: TaskId,
    pub combination: CombinationIndex,
    pub repetition: usize,
    pub kind: TrialFailureKind,
}

impl TrialFailure {
    #[must_use]
    pub fn new(task: &TaskDescriptor, kind: TrialFailureKind) -> Self {
        Self {
            task: task.id,
            combination: task.combination.clone(),
            repetition: task.repetition,
            kind,
        }
    }
}

/// Errors reading a named parameter inside a trial
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("parameter `{0}` is not part of this trial")]
    Missing(String),
    #[error("parameter `{name}` is {found}, expected {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors reading an auxiliary export inside a trial
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no export named `{0}`")]
    Missing(String),
    #[error("export `{name}` could not be decoded: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A stored array whose buffer disagrees with its declared axes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("array shape {0:?} has more cells than fit in memory")]
    Overflow(Vec<usize>),
    #[error("array shape {shape:?} needs {expected} cells but {found} are stored")]
    Length {
        shape: Vec<usize>,
        expected: usize,
        found: usize,
    },
    #[error("strides {found:?} are not row-major for shape {shape:?}")]
    Strides {
        shape: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("result cells have shape {found:?}, the axes describe {expected:?}")]
    Axes {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

/// Errors that stop a study before or around dispatch
#[derive(Debug, Error)]
pub enum StudyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    Pool(String),
    #[error("failed to write timing estimate: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize timing estimate: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that abort a pivot
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PivotError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}
