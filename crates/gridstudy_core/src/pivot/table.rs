use serde::{Deserialize, Serialize};

use crate::model::{ParamValue, StudyMetadata};
use crate::pivot::index::AxisIndex;

/// How field blocks are arranged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldLayout {
    /// One table with the field blocks side by side
    #[default]
    Stacked,
    /// One table per field
    Separate,
}

/// Cells of one result field, row-major over (row key, column key)
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBlock {
    pub field: String,
    pub n_cols: usize,
    pub cells: Vec<Option<f64>>,
}

impl FieldBlock {
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if col >= self.n_cols {
            return None;
        }
        self.cells.get(row * self.n_cols + col).copied().flatten()
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.cells.len().checked_div(self.n_cols).unwrap_or(0)
    }
}

/// Run summary printed under a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableNotes {
    pub repetitions: usize,
    pub total_trials: usize,
    pub failure_count: usize,
    /// Whether the cells were reduced from a raw array
    pub raw_source: bool,
}

impl From<&StudyMetadata> for TableNotes {
    fn from(metadata: &StudyMetadata) -> Self {
        Self {
            repetitions: metadata.repetitions,
            total_trials: metadata.total_trials,
            failure_count: metadata.failure_count,
            raw_source: metadata.raw,
        }
    }
}

/// A pivoted view of a result array. Values are stored unrounded; `digits`
/// and `width_scale` only matter when rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub rows: AxisIndex,
    pub cols: AxisIndex,
    pub blocks: Vec<FieldBlock>,
    /// Parameters pinned to a single value, in grid order
    pub fixed: Vec<(String, ParamValue)>,
    pub layout: FieldLayout,
    pub digits: usize,
    pub width_scale: f64,
    pub notes: Option<TableNotes>,
}

impl PivotTable {
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Columns per field block
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.cols.len()
    }

    #[must_use]
    pub fn block(&self, field: &str) -> Option<&FieldBlock> {
        self.blocks.iter().find(|b| b.field == field)
    }

    #[must_use]
    pub fn get(&self, field: &str, row: usize, col: usize) -> Option<f64> {
        self.block(field)?.get(row, col)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.field.as_str())
    }
}
