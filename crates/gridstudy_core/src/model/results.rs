//! Trial outputs, the field schema that binds them, and study metadata

use std::time::Duration;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, TrialFailureKind};

/// Named scalar values returned by one trial invocation, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    fields: Vec<(String, f64)>,
}

impl TrialResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Result with a single field
    #[must_use]
    pub fn single(name: impl Into<String>, value: f64) -> Self {
        Self::new().with(name, value)
    }

    /// Builder form of [`TrialResult::insert`]
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field, replacing any previous value under the same name
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>, const N: usize> From<[(S, f64); N]> for TrialResult {
    fn from(fields: [(S, f64); N]) -> Self {
        fields.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for TrialResult {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut result = TrialResult::new();
        for (name, value) in iter {
            result.insert(name, value);
        }
        result
    }
}

/// The fixed, ordered set of result fields every trial in a study must return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSchema {
    fields: Vec<String>,
}

impl ResultSchema {
    /// Declare a schema up front. Names must be unique and there must be at least one.
    pub fn new<I, S>(fields: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(ConfigError::EmptySchema);
        }
        let mut seen = FxHashSet::default();
        for field in &fields {
            if !seen.insert(field.as_str()) {
                return Err(ConfigError::DuplicateField(field.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// Lock the schema from a trial's output, keeping its field order
    pub fn from_result(result: &TrialResult) -> Result<Self, TrialFailureKind> {
        if result.is_empty() {
            return Err(TrialFailureKind::EmptyResult);
        }
        Ok(Self {
            fields: result.names().map(str::to_string).collect(),
        })
    }

    /// Schema with no fields, used when no trial ever succeeded
    pub(crate) fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Values of `result` in schema order, or a mismatch if the field sets differ.
    pub fn align(&self, result: &TrialResult) -> Result<Vec<f64>, TrialFailureKind> {
        let mismatch = || TrialFailureKind::SchemaMismatch {
            expected: self.fields.clone(),
            found: result.names().map(str::to_string).collect(),
        };
        if result.len() != self.fields.len() {
            return Err(mismatch());
        }
        self.fields
            .iter()
            .map(|field| result.get(field).ok_or_else(mismatch))
            .collect()
    }
}

/// Summary of a finished study, returned next to the result array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyMetadata {
    /// Grid parameter names in declared (axis) order
    pub param_names: Vec<String>,
    /// Number of values per parameter
    pub param_sizes: Vec<usize>,
    pub repetitions: usize,
    /// Result field names in schema order
    pub fields: Vec<String>,
    /// Whether the array still carries the repetition axis
    pub raw: bool,
    pub degree: usize,
    pub total_trials: usize,
    pub failure_count: usize,
    /// Collapsed cells left without any successful repetition
    pub missing_cells: usize,
    pub elapsed: Duration,
}

impl StudyMetadata {
    #[must_use]
    pub fn grid_size(&self) -> usize {
        self.param_sizes.iter().product()
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.total_trials.saturating_sub(self.failure_count)
    }

    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.total_trials > 0 && self.failure_count == self.total_trials
    }
}
