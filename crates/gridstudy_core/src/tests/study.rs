//! End-to-end tests for `run_study`

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{coordinate_trial, example_grid, z_test};
use crate::assemble::SchemaSource;
use crate::dispatch::StudyProgress;
use crate::error::{ConfigError, StudyError, TrialFailureKind};
use crate::grid::ParameterGrid;
use crate::model::{ResultSchema, TaskId, TrialResult};
use crate::study::{StudyConfig, run_study};
use crate::timing::TimeEstimateConfig;
use crate::trial::{Exports, trial_fn};

#[test]
fn test_oversized_grid_runs_no_trials() {
    let calls = AtomicUsize::new(0);
    let trial = trial_fn(|_params, _ctx| {
        calls.fetch_add(1, Ordering::Relaxed);
        Ok(TrialResult::single("x", 1.0))
    });
    let grid = ParameterGrid::new()
        .with("a", [1, 2, 3, 4])
        .with("b", [1, 2, 3, 4, 5, 6])
        .with("c", [1, 2]);

    let err = run_study(&trial, &grid, &StudyConfig::new(10).max_grid_size(40)).unwrap_err();
    assert!(matches!(
        err,
        StudyError::Config(ConfigError::GridTooLarge { size: 48, max: 40 })
    ));
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[test]
fn test_zero_degree_is_a_config_error() {
    let grid = ParameterGrid::new().with("a", [1]);
    let err = run_study(&coordinate_trial, &grid, &StudyConfig::new(1).degree(0)).unwrap_err();
    assert!(matches!(err, StudyError::Config(ConfigError::ZeroDegree)));
}

#[test]
fn test_z_test_study_collapsed_shape() {
    let config = StudyConfig::new(1000).raw(false).seed(2024);
    let output = run_study(&z_test, &example_grid(), &config).unwrap();
    let result = &output.result;

    assert_eq!(result.array.shape(), &[4, 6, 2, 1]);
    assert_eq!(result.metadata.fields, vec!["decision"]);
    assert_eq!(result.metadata.total_trials, 48_000);
    assert_eq!(result.metadata.failure_count, 0);
    assert_eq!(output.seed, 2024);

    // Under the null the rejection rate sits near the nominal 5%
    let size = result.array.value(&[3, 0, 0], None, 0).unwrap();
    assert!((0.02..0.09).contains(&size), "size {size}");
    // Far from the null with n = 40 the test nearly always rejects
    let power = result.array.value(&[3, 5, 0], None, 0).unwrap();
    assert!(power > 0.95, "power {power}");
}

#[test]
fn test_parallel_matches_sequential() {
    let grid = example_grid();
    let sequential = run_study(&z_test, &grid, &StudyConfig::new(20).seed(11)).unwrap();
    let parallel = run_study(&z_test, &grid, &StudyConfig::new(20).seed(11).degree(4)).unwrap();
    assert_eq!(sequential.result.array, parallel.result.array);
    assert_eq!(parallel.result.metadata.degree, 4);
}

#[test]
fn test_failures_leave_missing_cells() {
    let grid = ParameterGrid::new().with("n", [1, 2, 3]);
    let trial = trial_fn(|params, ctx| {
        let n = params.i64("n")?;
        if n == 2 && ctx.repetition == 0 {
            return Err("bad draw".into());
        }
        if n == 3 {
            panic!("always fails");
        }
        Ok(TrialResult::single("x", n as f64))
    });

    let output = run_study(&trial, &grid, &StudyConfig::new(2).trace(true).seed(1)).unwrap();
    let array = &output.result.array;
    assert_eq!(array.value(&[0], Some(1), 0), Some(1.0));
    assert_eq!(array.value(&[1], Some(0), 0), None);
    assert_eq!(array.value(&[1], Some(1), 0), Some(2.0));
    assert_eq!(array.value(&[2], Some(0), 0), None);
    assert_eq!(output.result.metadata.failure_count, 3);

    let trace = output.trace.unwrap();
    assert_eq!(trace.tasks.len(), 6);
    assert_eq!(trace.schema_source, SchemaSource::Inferred(TaskId(0)));
    let failed: Vec<usize> = trace.failures.iter().map(|f| f.task.0).collect();
    assert_eq!(failed, vec![2, 4, 5]);
    assert_eq!(trace.failures[0].kind, TrialFailureKind::Error("bad draw".into()));
    assert!(matches!(trace.failures[1].kind, TrialFailureKind::Panic(_)));
}

#[test]
fn test_collapsed_cell_without_successes_is_missing() {
    let grid = ParameterGrid::new().with("n", [1, 2]);
    let trial = trial_fn(|params, _ctx| match params.i64("n")? {
        1 => Ok(TrialResult::single("x", 0.0)),
        _ => Err("never works".into()),
    });
    let output = run_study(&trial, &grid, &StudyConfig::new(3).raw(false)).unwrap();
    assert_eq!(output.result.array.value(&[0], None, 0), Some(0.0));
    assert_eq!(output.result.array.value(&[1], None, 0), None);
    assert_eq!(output.result.metadata.missing_cells, 1);
}

#[test]
fn test_all_failed_run_is_returned() {
    let grid = ParameterGrid::new().with("n", [1, 2]);
    let trial = trial_fn(|_params, _ctx| Err("nope".into()));
    let output = run_study(&trial, &grid, &StudyConfig::new(2)).unwrap();
    let metadata = &output.result.metadata;
    assert!(metadata.all_failed());
    assert_eq!(metadata.failure_count, metadata.total_trials);
    assert_eq!(output.result.array.shape(), &[2, 2, 0]);
}

#[test]
fn test_declared_schema_catches_mismatch() {
    let grid = ParameterGrid::new().with("n", [1, 2]);
    let trial = trial_fn(|params, _ctx| match params.i64("n")? {
        1 => Ok(TrialResult::from([("mean", 0.0), ("sd", 1.0)])),
        _ => Ok(TrialResult::single("mean", 0.0)),
    });
    let schema = ResultSchema::new(["mean", "sd"]).unwrap();
    let output = run_study(&trial, &grid, &StudyConfig::new(1).schema(schema).trace(true)).unwrap();
    let trace = output.trace.unwrap();
    assert_eq!(trace.schema_source, SchemaSource::Declared);
    assert!(matches!(
        trace.failures[0].kind,
        TrialFailureKind::SchemaMismatch { .. }
    ));
}

#[test]
fn test_exports_reach_every_trial() {
    let grid = ParameterGrid::new().with("n", [1, 2, 3]);
    let exports = Exports::new().with("offset", &100.0).unwrap();
    let trial = trial_fn(|params, ctx| {
        let offset: f64 = ctx.export("offset")?;
        Ok(TrialResult::single("x", offset + params.f64("n")?))
    });
    let output = run_study(&trial, &grid, &StudyConfig::new(1).exports(exports).degree(2)).unwrap();
    assert_eq!(output.result.array.value(&[2], Some(0), 0), Some(103.0));
}

#[test]
fn test_progress_and_timing_estimate() {
    let dir = tempfile::tempdir().unwrap();
    let progress = StudyProgress::default();
    let estimate = TimeEstimateConfig {
        sample_repetitions: 2,
        save: true,
        output_dir: dir.path().to_path_buf(),
    };
    let config = StudyConfig::new(10)
        .progress(progress.clone())
        .estimate_time(estimate)
        .seed(5);
    let output = run_study(&z_test, &example_grid(), &config).unwrap();

    assert_eq!(progress.total(), 480);
    assert_eq!(progress.completed(), 480);

    let estimate = output.estimate.unwrap();
    assert_eq!(estimate.sample_tasks, 96);
    assert_eq!(estimate.total_tasks, 480);
    assert!(dir.path().join(estimate.file_name()).exists());
    // Sampling leaves the assembled run untouched
    assert_eq!(output.result.metadata.total_trials, 480);
}
