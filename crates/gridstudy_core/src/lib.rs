//! Grid-based simulation studies
//!
//! This crate runs a user-supplied stochastic trial at every point of a
//! Cartesian parameter grid, many times per point, and gathers the outputs
//! into a dense N-dimensional array. It supports:
//! - Deterministic row-major grid enumeration with a size ceiling
//! - Failure-isolating trial execution with reproducible per-task seeds
//! - Sequential or rayon-backed parallel dispatch with progress tracking
//! - Raw or repetition-collapsed result arrays with explicit missing cells
//! - Pivoting any parameter subset onto table rows and columns
//! - Pre-flight run-time estimation
//!
//! # Example
//!
//! ```ignore
//! use gridstudy_core::{
//!     ParameterGrid, StudyConfig, TableSpec, TrialResult, make_table, run_study, trial_fn,
//! };
//!
//! let grid = ParameterGrid::new()
//!     .with("n", [10, 50, 100, 500])
//!     .with("loc", [0.0, 0.2, 0.4, 0.6, 0.8, 1.0])
//!     .with("scale", [1, 2]);
//!
//! let trial = trial_fn(|params, ctx| {
//!     let n = params.usize("n")?;
//!     // ...draw n samples from ctx.rng() and test...
//!     Ok(TrialResult::single("decision", 1.0))
//! });
//!
//! let output = run_study(&trial, &grid, &StudyConfig::new(1000).raw(false))?;
//! let table = make_table(&output.result, &TableSpec::new().rows(["n"]).cols(["loc", "scale"]))?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod array;
pub mod assemble;
pub mod dispatch;
pub mod error;
pub mod grid;
pub mod io;
pub mod pivot;
pub mod reduce;
pub mod study;
pub mod timing;
pub mod trial;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use array::{NdGrid, ResultArray};
pub use assemble::{ResultAssembler, SchemaSource};
pub use dispatch::{Dispatcher, StudyProgress};
pub use error::{
    AggregationError, ConfigError, ExportError, LayoutError, ParamError, PivotError, StudyError,
    TrialError, TrialFailure, TrialFailureKind,
};
pub use grid::{Combinations, GridParameter, ParamSet, ParameterGrid};
pub use model::{
    CombinationIndex, ParamValue, ResultSchema, StudyMetadata, TaskDescriptor, TaskId,
    TrialResult,
};
pub use pivot::{FieldLayout, PivotTable, TableSpec, make_table, pivot};
pub use reduce::{PerField, Reduction, Transform};
pub use study::{StudyConfig, StudyOutput, StudyResult, StudyTrace, run_study};
pub use timing::{TimeEstimateConfig, TimingEstimate};
pub use trial::{Exports, Trial, TrialContext, TrialOutcome, TrialRunner, trial_fn};
