//! Dense N-dimensional storage for study results.
//!
//! [`NdGrid`] is a flat row-major buffer with stride-based indexing.
//! [`ResultArray`] wraps an `NdGrid<Option<f64>>` with the axis description of
//! a study: one axis per grid parameter in declared order, then the repetition
//! axis (raw arrays only), then the result-field axis. `None` marks a missing
//! cell and is never conflated with zero.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::grid::ParameterGrid;
use crate::model::{CombinationIndex, ResultSchema};

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for axis in (1..shape.len()).rev() {
        strides[axis - 1] = strides[axis].saturating_mul(shape[axis]);
    }
    strides
}

/// Row-major N-dimensional buffer; the last axis is contiguous.
///
/// Deserializing checks that the buffer length and strides agree with the
/// shape, so a loaded grid indexes exactly like a freshly built one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "StoredGrid<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub struct NdGrid<T> {
    data: Vec<T>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

#[derive(Deserialize)]
struct StoredGrid<T> {
    data: Vec<T>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl<T> TryFrom<StoredGrid<T>> for NdGrid<T> {
    type Error = LayoutError;

    fn try_from(stored: StoredGrid<T>) -> Result<Self, Self::Error> {
        let StoredGrid {
            data,
            shape,
            strides,
        } = stored;
        let expected = shape
            .iter()
            .try_fold(1usize, |cells, &n| cells.checked_mul(n))
            .ok_or_else(|| LayoutError::Overflow(shape.clone()))?;
        if data.len() != expected {
            return Err(LayoutError::Length {
                shape,
                expected,
                found: data.len(),
            });
        }
        if strides != row_major_strides(&shape) {
            return Err(LayoutError::Strides {
                shape,
                found: strides,
            });
        }
        Ok(Self {
            data,
            shape,
            strides,
        })
    }
}

impl<T: Clone> NdGrid<T> {
    pub fn new(shape: Vec<usize>, fill: T) -> Self {
        Self {
            data: vec![fill; shape.iter().product()],
            strides: row_major_strides(&shape),
            shape,
        }
    }
}

impl<T> NdGrid<T> {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset of `indices` in the backing buffer, or `None` if any is out of range
    pub fn flat_index(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.shape.len() {
            return None;
        }
        indices
            .iter()
            .zip(&self.shape)
            .zip(&self.strides)
            .try_fold(0, |offset, ((&i, &n), &stride)| {
                (i < n).then(|| offset + i * stride)
            })
    }

    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        self.flat_index(indices).map(|i| &self.data[i])
    }

    /// Returns false when out of bounds
    pub fn set(&mut self, indices: &[usize], value: T) -> bool {
        match self.flat_index(indices) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Every coordinate in storage order
    pub fn indices(&self) -> GridIndices {
        GridIndices {
            shape: self.shape.clone(),
            next: (!self.data.is_empty()).then(|| vec![0; self.shape.len()]),
        }
    }

    /// `(coordinate, value)` pairs in storage order
    pub fn iter(&self) -> impl Iterator<Item = (Vec<usize>, &T)> {
        self.indices().zip(&self.data)
    }
}

/// Odometer over the coordinates of an [`NdGrid`]
pub struct GridIndices {
    shape: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl Iterator for GridIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut following = current.clone();
        let carried = following
            .iter_mut()
            .zip(&self.shape)
            .rev()
            .all(|(i, &n)| {
                *i += 1;
                if *i < n {
                    return false;
                }
                *i = 0;
                true
            });
        if !carried {
            self.next = Some(following);
        }
        Some(current)
    }
}

/// The assembled output of a study.
///
/// Indexed by `(param_1, .., param_k, [repetition], field)`. Immutable once
/// returned from the assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredArray")]
pub struct ResultArray {
    grid: ParameterGrid,
    /// Repetition count when the repetition axis is present
    repetitions: Option<usize>,
    schema: ResultSchema,
    cells: NdGrid<Option<f64>>,
}

#[derive(Deserialize)]
struct StoredArray {
    grid: ParameterGrid,
    repetitions: Option<usize>,
    schema: ResultSchema,
    cells: NdGrid<Option<f64>>,
}

impl TryFrom<StoredArray> for ResultArray {
    type Error = LayoutError;

    fn try_from(stored: StoredArray) -> Result<Self, Self::Error> {
        let expected = axes_shape(&stored.grid, stored.repetitions, &stored.schema);
        if stored.cells.shape() != expected.as_slice() {
            return Err(LayoutError::Axes {
                expected,
                found: stored.cells.shape().to_vec(),
            });
        }
        Ok(Self {
            grid: stored.grid,
            repetitions: stored.repetitions,
            schema: stored.schema,
            cells: stored.cells,
        })
    }
}

fn axes_shape(
    grid: &ParameterGrid,
    repetitions: Option<usize>,
    schema: &ResultSchema,
) -> Vec<usize> {
    let mut shape = grid.shape();
    shape.extend(repetitions);
    shape.push(schema.len());
    shape
}

impl ResultArray {
    /// All-missing array for the given axes
    pub(crate) fn missing(
        grid: ParameterGrid,
        repetitions: Option<usize>,
        schema: ResultSchema,
    ) -> Self {
        let shape = axes_shape(&grid, repetitions, &schema);
        Self {
            grid,
            repetitions,
            schema,
            cells: NdGrid::new(shape, None),
        }
    }

    #[must_use]
    pub fn grid(&self) -> &ParameterGrid {
        &self.grid
    }

    #[must_use]
    pub fn schema(&self) -> &ResultSchema {
        &self.schema
    }

    /// Repetition count if the array still carries the repetition axis
    #[must_use]
    pub fn repetitions(&self) -> Option<usize> {
        self.repetitions
    }

    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.repetitions.is_some()
    }

    /// Full shape: grid sizes, then repetitions (raw only), then field count
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.cells.shape()
    }

    #[must_use]
    pub fn cells(&self) -> &NdGrid<Option<f64>> {
        &self.cells
    }

    /// Value at a grid point, repetition and field. Out-of-range coordinates read as missing.
    #[must_use]
    pub fn value(
        &self,
        combination: &[usize],
        repetition: Option<usize>,
        field: usize,
    ) -> Option<f64> {
        let mut index = combination.to_vec();
        if self.is_raw() {
            index.push(repetition?);
        }
        index.push(field);
        self.cells.get(&index).copied().flatten()
    }

    /// Every repetition's value for one (grid point, field). A collapsed
    /// array yields exactly one entry.
    #[must_use]
    pub fn repetition_values(&self, combination: &[usize], field: usize) -> Vec<Option<f64>> {
        match self.repetitions {
            Some(reps) => (0..reps)
                .map(|r| self.value(combination, Some(r), field))
                .collect(),
            None => vec![self.value(combination, None, field)],
        }
    }

    /// Number of missing cells
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.cells.data().iter().filter(|c| c.is_none()).count()
    }

    /// Write one trial's values (in schema order)
    pub(crate) fn set_trial(
        &mut self,
        combination: &CombinationIndex,
        repetition: usize,
        values: &[f64],
    ) {
        let mut index = combination.positions().to_vec();
        if self.is_raw() {
            index.push(repetition);
        }
        index.push(0);
        let field_axis = index.len() - 1;
        for (field, &value) in values.iter().enumerate() {
            index[field_axis] = field;
            self.cells.set(&index, Some(value));
        }
    }

    /// Drop the repetition axis, reducing the non-missing values of each
    /// (grid point, field) with `reduce`. Cells without any value stay missing.
    /// A collapsed array is returned unchanged.
    pub fn collapse_with<F>(&self, reduce: F) -> ResultArray
    where
        F: Fn(&[f64]) -> Option<f64>,
    {
        if !self.is_raw() {
            return self.clone();
        }
        let mut collapsed = ResultArray::missing(self.grid.clone(), None, self.schema.clone());
        let mut present = Vec::new();
        for index in collapsed.cells.indices() {
            let Some((&field, combination)) = index.split_last() else {
                continue;
            };
            present.clear();
            present.extend(
                self.repetition_values(combination, field)
                    .into_iter()
                    .flatten(),
            );
            if !present.is_empty() {
                collapsed.cells.set(&index, reduce(&present));
            }
        }
        collapsed
    }

    /// Collapse repetitions with the arithmetic mean
    #[must_use]
    pub fn collapse_mean(&self) -> ResultArray {
        self.collapse_with(|values| Some(values.iter().sum::<f64>() / values.len() as f64))
    }
}
