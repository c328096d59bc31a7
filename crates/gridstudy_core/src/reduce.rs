//! Reductions over repetitions and elementwise value transforms.
//!
//! Both operate on `Option<f64>` cells: missing values are dropped before a
//! reduction runs, a reduction over nothing is missing, and a transform of a
//! missing cell is missing.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{AggregationError, ConfigError};

type ReduceFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;
type TransformFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// How the repetitions of one cell collapse to a single value
#[derive(Clone, Default)]
pub enum Reduction {
    #[default]
    Mean,
    Median,
    Sum,
    Min,
    Max,
    /// Sample standard deviation (n - 1); a single value yields missing
    StdDev,
    /// The single present value; more than one is an error
    Identity,
    Custom(ReduceFn),
}

impl Reduction {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Reduction::Custom(Arc::new(f))
    }

    /// Reduce the present values of `values`. `field` only labels errors.
    pub fn apply(
        &self,
        field: &str,
        values: &[Option<f64>],
    ) -> Result<Option<f64>, AggregationError> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return Ok(None);
        }
        let n = present.len() as f64;
        let value = match self {
            Reduction::Mean => present.iter().sum::<f64>() / n,
            Reduction::Sum => present.iter().sum(),
            Reduction::Min => present.iter().copied().fold(f64::INFINITY, f64::min),
            Reduction::Max => present.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reduction::Median => {
                let mut sorted = present;
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            Reduction::StdDev => {
                if present.len() < 2 {
                    return Ok(None);
                }
                let mean = present.iter().sum::<f64>() / n;
                let ss: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
                (ss / (n - 1.0)).sqrt()
            }
            Reduction::Identity => match present.as_slice() {
                [single] => *single,
                _ => {
                    return Err(AggregationError::NotScalar {
                        field: field.to_string(),
                        count: present.len(),
                    });
                }
            },
            Reduction::Custom(f) => f(&present),
        };
        Ok(Some(value))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Reduction::Mean => "mean",
            Reduction::Median => "median",
            Reduction::Sum => "sum",
            Reduction::Min => "min",
            Reduction::Max => "max",
            Reduction::StdDev => "sd",
            Reduction::Identity => "identity",
            Reduction::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reduction::{}", self.name())
    }
}

impl FromStr for Reduction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mean" => Ok(Reduction::Mean),
            "median" => Ok(Reduction::Median),
            "sum" => Ok(Reduction::Sum),
            "min" => Ok(Reduction::Min),
            "max" => Ok(Reduction::Max),
            "sd" | "std" => Ok(Reduction::StdDev),
            "identity" => Ok(Reduction::Identity),
            other => Err(ConfigError::UnknownReduction(other.to_string())),
        }
    }
}

/// Elementwise function applied to a cell after reduction
#[derive(Clone, Default)]
pub enum Transform {
    #[default]
    Identity,
    /// Multiply by a constant, e.g. 100 for percentages
    Scale(f64),
    Custom(TransformFn),
}

impl Transform {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Transform::Custom(Arc::new(f))
    }

    #[must_use]
    pub fn apply(&self, value: Option<f64>) -> Option<f64> {
        let v = value?;
        Some(match self {
            Transform::Identity => v,
            Transform::Scale(k) => v * k,
            Transform::Custom(f) => f(v),
        })
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => f.write_str("Transform::identity"),
            Transform::Scale(k) => write!(f, "Transform::scale({k})"),
            Transform::Custom(_) => f.write_str("Transform::custom"),
        }
    }
}

/// Accepts `identity`, `percent` and `scale=<k>`
impl FromStr for Transform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "identity" => return Ok(Transform::Identity),
            "percent" => return Ok(Transform::Scale(100.0)),
            _ => {}
        }
        s.strip_prefix("scale=")
            .and_then(|k| k.parse::<f64>().ok())
            .map(Transform::Scale)
            .ok_or_else(|| ConfigError::UnknownTransform(s.to_string()))
    }
}

/// A value applied to every field, with optional per-field overrides
#[derive(Debug, Clone, Default)]
pub struct PerField<T> {
    pub all: T,
    pub overrides: Vec<(String, T)>,
}

impl<T> PerField<T> {
    pub fn new(all: T) -> Self {
        Self {
            all,
            overrides: Vec::new(),
        }
    }

    /// Override for one field; a later override for the same field wins
    pub fn set(&mut self, field: impl Into<String>, value: T) {
        let field = field.into();
        self.overrides.retain(|(f, _)| *f != field);
        self.overrides.push((field, value));
    }

    pub fn get(&self, field: &str) -> &T {
        self.overrides
            .iter()
            .find(|(f, _)| f == field)
            .map_or(&self.all, |(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.overrides.iter().map(|(f, _)| f.as_str())
    }
}
