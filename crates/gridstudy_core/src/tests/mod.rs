//! In-crate integration tests for the study engine
//!
//! Tests are organized by topic:
//! - `grid` - Enumeration order, task lists and size limits
//! - `assembler` - Array shapes, ordering independence and collapsing
//! - `study` - End-to-end `run_study` runs, failures and timing estimates
//! - `pivot` - Table layout, partial grids, reductions and validation

mod study;

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::TrialError;
use crate::grid::{ParamSet, ParameterGrid};
use crate::model::TrialResult;
use crate::trial::TrialContext;

/// n(4) x loc(6) x scale(2)
pub(crate) fn example_grid() -> ParameterGrid {
    ParameterGrid::new()
        .with("n", [10, 20, 30, 40])
        .with("loc", [0.0, 0.2, 0.4, 0.6, 0.8, 1.0])
        .with("scale", [1, 2])
}

/// Two-sided z-test of mean zero at the 5% level with known scale
pub(crate) fn z_test(params: &ParamSet, ctx: &TrialContext) -> Result<TrialResult, TrialError> {
    let n = params.usize("n")?;
    let loc = params.f64("loc")?;
    let scale = params.f64("scale")?;
    let normal = Normal::new(loc, scale)?;
    let mut rng = ctx.rng();
    let sum: f64 = (0..n).map(|_| normal.sample(&mut rng)).sum();
    let z = (sum / n as f64) / (scale / (n as f64).sqrt());
    Ok(TrialResult::single("decision", f64::from(u8::from(z.abs() > 1.96))))
}

/// Deterministic two-field trial: `value = 100 * i + 10 * j + k + repetition / 10`
pub(crate) fn coordinate_trial(
    _params: &ParamSet,
    ctx: &TrialContext,
) -> Result<TrialResult, TrialError> {
    let p = ctx.combination.positions();
    let value = p.iter().fold(0.0, |acc, &i| acc * 10.0 + i as f64) + ctx.repetition as f64 / 10.0;
    let noise: f64 = ctx.rng().random();
    Ok(TrialResult::from([("value", value), ("noise", noise)]))
}
