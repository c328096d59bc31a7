//! Parameter grids and their Cartesian enumeration.
//!
//! A [`ParameterGrid`] is an ordered list of named parameters, each with an
//! ordered list of values. Declared order is significant everywhere downstream:
//! it is the axis order of the result array and the default display order of
//! tables. Enumeration is row-major, so the first parameter varies slowest and
//! the last varies fastest.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ConfigError, ParamError};
use crate::model::{CombinationIndex, ParamValue, TaskDescriptor, TaskId};

/// One named grid axis and its admissible values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParameter {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Ordered mapping from parameter name to its grid of values.
///
/// Serializes as a map; deserializing keeps document order and rejects
/// duplicate names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterGrid {
    params: Vec<GridParameter>,
}

impl ParameterGrid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter (builder form)
    #[must_use]
    pub fn with<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.push(name, values);
        self
    }

    /// Append a parameter. Duplicates are reported by [`ParameterGrid::validate`].
    pub fn push<I, V>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.params.push(GridParameter {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
    }

    #[must_use]
    pub fn params(&self) -> &[GridParameter] {
        &self.params
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Number of parameters (axes)
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[ParamValue]> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.values.as_slice())
    }

    /// Number of values per parameter
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.params.iter().map(|p| p.values.len()).collect()
    }

    /// Total number of combinations, or `None` on overflow
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        self.params
            .iter()
            .try_fold(1usize, |acc, p| acc.checked_mul(p.values.len()))
    }

    /// Check that the grid has parameters, unique names, and no empty value list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.params.is_empty() {
            return Err(ConfigError::EmptyGrid);
        }
        let mut seen = FxHashSet::default();
        for param in &self.params {
            if !seen.insert(param.name.as_str()) {
                return Err(ConfigError::DuplicateParameter(param.name.clone()));
            }
            if param.values.is_empty() {
                return Err(ConfigError::EmptyParameter(param.name.clone()));
            }
        }
        Ok(())
    }

    /// Validate the grid and check its size against `max_size` without enumerating it.
    pub fn checked_size(&self, max_size: usize) -> Result<usize, ConfigError> {
        self.validate()?;
        let size = self
            .size()
            .ok_or(ConfigError::GridSizeOverflow { max: max_size })?;
        if size > max_size {
            return Err(ConfigError::GridTooLarge {
                size,
                max: max_size,
            });
        }
        Ok(size)
    }

    /// Lazily enumerate every combination in row-major order.
    ///
    /// Validation and the size ceiling are checked before anything is produced.
    pub fn combinations(&self, max_size: usize) -> Result<Combinations, ConfigError> {
        let size = self.checked_size(max_size)?;
        Ok(Combinations {
            shape: self.shape(),
            current: vec![0; self.params.len()],
            remaining: size,
        })
    }

    /// Task descriptors for every (combination, repetition) pair, combination-major
    pub fn tasks(
        &self,
        repetitions: usize,
        max_size: usize,
    ) -> Result<Vec<TaskDescriptor>, ConfigError> {
        if repetitions == 0 {
            return Err(ConfigError::ZeroRepetitions);
        }
        let combinations = self.combinations(max_size)?;
        let mut tasks = Vec::with_capacity(combinations.len() * repetitions);
        for combination in combinations {
            for repetition in 0..repetitions {
                tasks.push(TaskDescriptor {
                    id: TaskId(tasks.len()),
                    combination: combination.clone(),
                    repetition,
                });
            }
        }
        Ok(tasks)
    }

    /// Named values at one grid point
    #[must_use]
    pub fn param_set(&self, combination: &CombinationIndex) -> ParamSet {
        ParamSet {
            entries: self
                .params
                .iter()
                .zip(combination.positions())
                .map(|(p, &pos)| (p.name.clone(), p.values[pos].clone()))
                .collect(),
        }
    }
}

impl Serialize for ParameterGrid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.params.len()))?;
        for param in &self.params {
            map.serialize_entry(&param.name, &param.values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParameterGrid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GridVisitor;

        impl<'de> Visitor<'de> for GridVisitor {
            type Value = ParameterGrid;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from parameter name to a list of values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut grid = ParameterGrid::new();
                while let Some((name, values)) =
                    access.next_entry::<String, Vec<ParamValue>>()?
                {
                    if grid.position(&name).is_some() {
                        return Err(serde::de::Error::custom(format!(
                            "parameter `{name}` is declared more than once"
                        )));
                    }
                    grid.params.push(GridParameter { name, values });
                }
                Ok(grid)
            }
        }

        deserializer.deserialize_map(GridVisitor)
    }
}

/// Row-major iterator over grid combinations (last parameter varies fastest)
#[derive(Debug, Clone)]
pub struct Combinations {
    shape: Vec<usize>,
    current: Vec<usize>,
    remaining: usize,
}

impl Iterator for Combinations {
    type Item = CombinationIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let result = CombinationIndex(self.current.clone());
        self.remaining -= 1;

        for i in (0..self.shape.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.shape[i] {
                break;
            }
            self.current[i] = 0;
        }

        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Combinations {}

/// The named parameter values handed to one trial.
///
/// Each trial gets its own copy; nothing here is shared mutably between workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParamSet {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn require(&self, name: &str) -> Result<&ParamValue, ParamError> {
        self.get(name)
            .ok_or_else(|| ParamError::Missing(name.to_string()))
    }

    fn wrong_type(name: &str, expected: &'static str, found: &ParamValue) -> ParamError {
        ParamError::WrongType {
            name: name.to_string(),
            expected,
            found: found.kind(),
        }
    }

    /// Numeric parameter (integers widen)
    pub fn f64(&self, name: &str) -> Result<f64, ParamError> {
        let value = self.require(name)?;
        value
            .as_f64()
            .ok_or_else(|| Self::wrong_type(name, "a number", value))
    }

    pub fn i64(&self, name: &str) -> Result<i64, ParamError> {
        let value = self.require(name)?;
        value
            .as_i64()
            .ok_or_else(|| Self::wrong_type(name, "an integer", value))
    }

    /// Non-negative integer parameter, e.g. a sample size
    pub fn usize(&self, name: &str) -> Result<usize, ParamError> {
        let value = self.require(name)?;
        value
            .as_i64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| Self::wrong_type(name, "a non-negative integer", value))
    }

    pub fn bool(&self, name: &str) -> Result<bool, ParamError> {
        let value = self.require(name)?;
        value
            .as_bool()
            .ok_or_else(|| Self::wrong_type(name, "a boolean", value))
    }

    pub fn str(&self, name: &str) -> Result<&str, ParamError> {
        let value = self.require(name)?;
        value
            .as_str()
            .ok_or_else(|| Self::wrong_type(name, "text", value))
    }
}
