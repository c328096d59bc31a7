//! Trials that can be named from a study file

use std::fmt;
use std::str::FromStr;

use gridstudy_core::{ParamSet, TrialContext, TrialError, TrialResult};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Two-sided critical value of the standard normal at the 5% level
const Z_CRITICAL_5PCT: f64 = 1.959_963_984_540_054;

pub type TrialFn = fn(&ParamSet, &TrialContext) -> Result<TrialResult, TrialError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTrial {
    /// Reject-or-not of a z-test for mean zero on `n` draws from N(`loc`, `scale`)
    ZTest,
    /// Sample mean and standard deviation of `n` draws from N(`loc`, `scale`)
    NormalMoments,
}

impl BuiltinTrial {
    pub const ALL: [BuiltinTrial; 2] = [BuiltinTrial::ZTest, BuiltinTrial::NormalMoments];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinTrial::ZTest => "z_test",
            BuiltinTrial::NormalMoments => "normal_moments",
        }
    }

    /// Result fields the trial returns
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            BuiltinTrial::ZTest => &["decision"],
            BuiltinTrial::NormalMoments => &["mean", "sd"],
        }
    }

    pub fn function(self) -> TrialFn {
        match self {
            BuiltinTrial::ZTest => z_test,
            BuiltinTrial::NormalMoments => normal_moments,
        }
    }
}

impl fmt::Display for BuiltinTrial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltinTrial {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinTrial::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = BuiltinTrial::ALL.iter().map(|t| t.name()).collect();
                format!("unknown trial `{s}` (known: {})", known.join(", "))
            })
    }
}

fn normal_draws(params: &ParamSet, ctx: &TrialContext) -> Result<Vec<f64>, TrialError> {
    let n = params.usize("n")?;
    if n == 0 {
        return Err("sample size `n` must be positive".into());
    }
    let normal = Normal::new(params.f64("loc")?, params.f64("scale")?)?;
    let mut rng = ctx.rng();
    Ok((0..n).map(|_| normal.sample(&mut rng)).collect())
}

fn z_test(params: &ParamSet, ctx: &TrialContext) -> Result<TrialResult, TrialError> {
    let draws = normal_draws(params, ctx)?;
    let scale = params.f64("scale")?;
    let n = draws.len() as f64;
    let mean = draws.iter().sum::<f64>() / n;
    let z = mean / (scale / n.sqrt());
    let reject = z.abs() > Z_CRITICAL_5PCT;
    Ok(TrialResult::single("decision", if reject { 1.0 } else { 0.0 }))
}

fn normal_moments(params: &ParamSet, ctx: &TrialContext) -> Result<TrialResult, TrialError> {
    let draws = normal_draws(params, ctx)?;
    if draws.len() < 2 {
        return Err("standard deviation needs at least two draws".into());
    }
    let n = draws.len() as f64;
    let mean = draws.iter().sum::<f64>() / n;
    let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Ok(TrialResult::from([("mean", mean), ("sd", var.sqrt())]))
}
