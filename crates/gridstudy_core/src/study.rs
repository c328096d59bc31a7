//! Running a whole study: enumerate, dispatch, assemble.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::array::ResultArray;
use crate::assemble::{ResultAssembler, SchemaSource};
use crate::dispatch::{Dispatcher, StudyProgress};
use crate::error::{StudyError, TrialFailure};
use crate::grid::ParameterGrid;
use crate::model::{ResultSchema, StudyMetadata, TaskDescriptor};
use crate::timing::{TimeEstimateConfig, TimingEstimate};
use crate::trial::{Exports, Trial, TrialRunner};

/// Default ceiling on the number of grid combinations
pub const DEFAULT_MAX_GRID_SIZE: usize = 1000;

/// Options for [`run_study`]
#[derive(Debug, Clone)]
pub struct StudyConfig {
    pub repetitions: usize,
    /// Worker count; 1 runs sequentially
    pub degree: usize,
    pub max_grid_size: usize,
    /// Keep the repetition axis instead of collapsing to the mean
    pub raw: bool,
    /// Base seed for per-task generators. `None` draws one at random.
    pub seed: Option<u64>,
    pub exports: Exports,
    /// Expected result fields; inferred from the first success when absent
    pub schema: Option<ResultSchema>,
    pub estimate_time: Option<TimeEstimateConfig>,
    /// Return a [`StudyTrace`] with the output
    pub trace: bool,
    pub progress: Option<StudyProgress>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            repetitions: 1,
            degree: 1,
            max_grid_size: DEFAULT_MAX_GRID_SIZE,
            raw: true,
            seed: None,
            exports: Exports::new(),
            schema: None,
            estimate_time: None,
            trace: false,
            progress: None,
        }
    }
}

impl StudyConfig {
    #[must_use]
    pub fn new(repetitions: usize) -> Self {
        Self {
            repetitions,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    #[must_use]
    pub fn max_grid_size(mut self, max: usize) -> Self {
        self.max_grid_size = max;
        self
    }

    #[must_use]
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn exports(mut self, exports: Exports) -> Self {
        self.exports = exports;
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: ResultSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn estimate_time(mut self, estimate: TimeEstimateConfig) -> Self {
        self.estimate_time = Some(estimate);
        self
    }

    #[must_use]
    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    #[must_use]
    pub fn progress(mut self, progress: StudyProgress) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// The assembled array and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyResult {
    pub array: ResultArray,
    pub metadata: StudyMetadata,
}

/// Debug view of a run, returned when [`StudyConfig::trace`] is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyTrace {
    pub tasks: Vec<TaskDescriptor>,
    pub schema_source: SchemaSource,
    pub failures: Vec<TrialFailure>,
    pub dispatch_elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyOutput {
    pub result: StudyResult,
    /// Base seed the run used
    pub seed: u64,
    pub estimate: Option<TimingEstimate>,
    pub trace: Option<StudyTrace>,
}

/// Run `trial` at every grid point, `config.repetitions` times each.
///
/// All configuration is checked before the first trial runs. Individual trial
/// failures never abort the study; they leave missing cells and are counted
/// in the metadata.
pub fn run_study<T: Trial + ?Sized>(
    trial: &T,
    grid: &ParameterGrid,
    config: &StudyConfig,
) -> Result<StudyOutput, StudyError> {
    let mut dispatcher = Dispatcher::new(config.degree)?;
    let tasks = grid.tasks(config.repetitions, config.max_grid_size)?;
    let seed = config.seed.unwrap_or_else(rand::random);

    tracing::info!(
        grid_size = tasks.len() / config.repetitions,
        repetitions = config.repetitions,
        tasks = tasks.len(),
        degree = config.degree,
        seed,
        "Starting study"
    );

    let runner = TrialRunner::new(trial, grid, Arc::new(config.exports.clone()), seed);

    let estimate = match &config.estimate_time {
        Some(estimate_config) => Some(estimate_run_time(
            &dispatcher,
            &runner,
            &tasks,
            estimate_config,
        )?),
        None => None,
    };

    if let Some(progress) = &config.progress {
        progress.reset(tasks.len());
        dispatcher = dispatcher.with_progress(progress.clone());
    }

    let mut assembler =
        ResultAssembler::new(grid.clone(), config.repetitions, config.schema.clone());
    let dispatch_start = Instant::now();
    let outcomes = dispatcher.map_over(&tasks, |task| runner.run(task))?;
    let dispatch_elapsed = dispatch_start.elapsed();
    assembler.ingest_all(outcomes);

    let trace = config.trace.then(|| StudyTrace {
        tasks: tasks.clone(),
        schema_source: assembler.schema_source(),
        failures: assembler.sorted_failures(),
        dispatch_elapsed,
    });

    let mut result = assembler.finalize(config.raw);
    result.metadata.degree = config.degree;

    tracing::info!(
        trials = result.metadata.total_trials,
        failures = result.metadata.failure_count,
        elapsed_ms = result.metadata.elapsed.as_millis() as u64,
        "Study finished"
    );

    Ok(StudyOutput {
        result,
        seed,
        estimate,
        trace,
    })
}

fn estimate_run_time<T: Trial + ?Sized>(
    dispatcher: &Dispatcher,
    runner: &TrialRunner<'_, T>,
    tasks: &[TaskDescriptor],
    config: &TimeEstimateConfig,
) -> Result<TimingEstimate, StudyError> {
    let sample = config.sample(tasks);
    let start = Instant::now();
    dispatcher.map_over(&sample, |task| runner.run(task))?;
    let estimate = TimingEstimate::extrapolate(
        sample.len(),
        tasks.len(),
        dispatcher.degree(),
        start.elapsed(),
    );

    tracing::info!(
        sample_tasks = estimate.sample_tasks,
        total_tasks = estimate.total_tasks,
        estimated_secs = estimate.estimated_total.as_secs_f64(),
        "Estimated run time"
    );

    if config.save {
        let path = estimate.save(&config.output_dir)?;
        tracing::info!(path = %path.display(), "Saved timing estimate");
    }
    Ok(estimate)
}
