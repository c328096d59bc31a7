//! Reshaping result arrays into two-dimensional tables.
//!
//! Any subset of grid parameters can go on the rows, any disjoint subset on
//! the columns. Each axis is a Cartesian index tree whose first declared name
//! varies fastest. Parameters on neither axis must resolve to a single value,
//! either because their grid has one value or because `partial_grid` pins them.
//!
//! ```ignore
//! let spec = TableSpec::new()
//!     .rows(["n"])
//!     .cols(["loc", "scale"])
//!     .partial("loc", [0.0, 0.6, 1.0]);
//! let table = make_table(&output.result, &spec)?;
//! ```

mod index;
mod table;

pub use index::{AxisIndex, AxisLevel, IndexNode};
pub use table::{FieldBlock, FieldLayout, PivotTable, TableNotes};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::array::ResultArray;
use crate::error::{AggregationError, ConfigError, PivotError};
use crate::grid::ParameterGrid;
use crate::model::{ParamValue, ResultSchema};
use crate::reduce::{PerField, Reduction, Transform};
use crate::study::StudyResult;

/// Default number of decimals when rendering
pub const DEFAULT_DIGITS: usize = 4;

/// What to put where in a pivot table
#[derive(Debug, Clone)]
pub struct TableSpec {
    /// Row parameters, innermost first
    pub rows: Vec<String>,
    /// Column parameters, innermost first
    pub cols: Vec<String>,
    pub digits: usize,
    /// Reduction over repetitions, used only for raw arrays
    pub collapse: PerField<Reduction>,
    pub transform: PerField<Transform>,
    /// Value subsets per parameter
    pub partial_grid: Vec<(String, Vec<ParamValue>)>,
    /// Fields to tabulate; all schema fields when `None`
    pub fields: Option<Vec<String>>,
    pub layout: FieldLayout,
    pub width_scale: f64,
    pub include_metadata: bool,
}

impl Default for TableSpec {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            cols: Vec::new(),
            digits: DEFAULT_DIGITS,
            collapse: PerField::default(),
            transform: PerField::default(),
            partial_grid: Vec::new(),
            fields: None,
            layout: FieldLayout::Stacked,
            width_scale: 1.0,
            include_metadata: true,
        }
    }
}

impl TableSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rows<I, S>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows = rows.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn cols<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cols = cols.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn digits(mut self, digits: usize) -> Self {
        self.digits = digits;
        self
    }

    /// Reduction for every field without an override
    #[must_use]
    pub fn collapse(mut self, reduction: Reduction) -> Self {
        self.collapse.all = reduction;
        self
    }

    #[must_use]
    pub fn collapse_field(mut self, field: impl Into<String>, reduction: Reduction) -> Self {
        self.collapse.set(field, reduction);
        self
    }

    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform.all = transform;
        self
    }

    #[must_use]
    pub fn transform_field(mut self, field: impl Into<String>, transform: Transform) -> Self {
        self.transform.set(field, transform);
        self
    }

    /// Restrict `param` to `values`. Order of `values` is irrelevant; grid order is kept.
    #[must_use]
    pub fn partial<I, V>(mut self, param: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        let param = param.into();
        self.partial_grid.retain(|(p, _)| *p != param);
        self.partial_grid
            .push((param, values.into_iter().map(Into::into).collect()));
        self
    }

    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn layout(mut self, layout: FieldLayout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn width_scale(mut self, scale: f64) -> Self {
        self.width_scale = scale;
        self
    }

    #[must_use]
    pub fn include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    /// Check the layout against a grid, and against the result fields when
    /// they are known, without needing any results
    pub fn check(
        &self,
        grid: &ParameterGrid,
        schema: Option<&ResultSchema>,
    ) -> Result<(), PivotError> {
        place_params(grid, self)?;
        if let Some(schema) = schema {
            check_fields(schema, self)?;
        }
        Ok(())
    }
}

/// Pivot a study result, attaching its run summary when requested
pub fn make_table(result: &StudyResult, spec: &TableSpec) -> Result<PivotTable, PivotError> {
    let mut table = pivot(&result.array, spec)?;
    if spec.include_metadata {
        table.notes = Some(TableNotes::from(&result.metadata));
    }
    Ok(table)
}

/// Pivot a result array. The array is only read.
pub fn pivot(array: &ResultArray, spec: &TableSpec) -> Result<PivotTable, PivotError> {
    let grid = array.grid();
    let schema = array.schema();
    let Placement {
        selections,
        base,
        fixed,
    } = place_params(grid, spec)?;
    let fields = check_fields(schema, spec)?;

    let axis_levels = |names: &[String]| -> Vec<AxisLevel> {
        names
            .iter()
            .filter_map(|name| {
                let axis = grid.position(name)?;
                let positions = selections[axis].clone();
                let values = positions
                    .iter()
                    .map(|&p| grid.params()[axis].values[p].clone())
                    .collect();
                Some(AxisLevel {
                    param: name.clone(),
                    axis,
                    positions,
                    values,
                })
            })
            .collect()
    };
    let rows = AxisIndex::build(axis_levels(&spec.rows));
    let cols = AxisIndex::build(axis_levels(&spec.cols));

    let mut blocks = Vec::with_capacity(fields.len());
    let mut coord = base.clone();
    for field in fields {
        let Some(field_idx) = schema.position(field) else {
            continue;
        };
        let collapse = spec.collapse.get(field);
        let transform = spec.transform.get(field);

        let mut cells = Vec::with_capacity(rows.len() * cols.len());
        for row in 0..rows.len() {
            for col in 0..cols.len() {
                coord.copy_from_slice(&base);
                rows.place(row, &mut coord);
                cols.place(col, &mut coord);

                let value = if array.is_raw() {
                    collapse.apply(field, &array.repetition_values(&coord, field_idx))?
                } else {
                    array.value(&coord, None, field_idx)
                };
                cells.push(transform.apply(value));
            }
        }
        blocks.push(FieldBlock {
            field: field.to_string(),
            n_cols: cols.len(),
            cells,
        });
    }

    Ok(PivotTable {
        rows,
        cols,
        blocks,
        fixed,
        layout: spec.layout,
        digits: spec.digits,
        width_scale: spec.width_scale,
        notes: None,
    })
}

/// Grid positions chosen for each parameter, and the coordinate shared by every cell
struct Placement {
    /// Selected positions per parameter, in grid order
    selections: Vec<Vec<usize>>,
    base: Vec<usize>,
    fixed: Vec<(String, ParamValue)>,
}

fn place_params(grid: &ParameterGrid, spec: &TableSpec) -> Result<Placement, PivotError> {
    let mut on_axis = FxHashSet::default();
    for name in spec.rows.iter().chain(&spec.cols) {
        if grid.position(name).is_none() {
            return Err(ConfigError::UnknownParameter(name.clone()).into());
        }
        if !on_axis.insert(name.as_str()) {
            return Err(ConfigError::DuplicateAxis(name.clone()).into());
        }
    }
    let mut partial: FxHashMap<&str, &[ParamValue]> = FxHashMap::default();
    for (name, values) in &spec.partial_grid {
        if grid.position(name).is_none() {
            return Err(ConfigError::UnknownParameter(name.clone()).into());
        }
        if partial.insert(name.as_str(), values.as_slice()).is_some() {
            return Err(ConfigError::DuplicateParameter(name.clone()).into());
        }
    }

    let mut selections = Vec::with_capacity(grid.len());
    for param in grid.params() {
        let positions = match partial.get(param.name.as_str()) {
            Some(wanted) => select_positions(&param.name, &param.values, wanted)?,
            None => (0..param.values.len()).collect(),
        };
        selections.push(positions);
    }

    // Everything off the axes collapses to one coordinate
    let mut base = vec![0; grid.len()];
    let mut fixed = Vec::new();
    for (axis, param) in grid.params().iter().enumerate() {
        if on_axis.contains(param.name.as_str()) {
            continue;
        }
        match selections[axis].as_slice() {
            [position] => {
                base[axis] = *position;
                fixed.push((param.name.clone(), param.values[*position].clone()));
            }
            many => {
                return Err(AggregationError::Unresolved {
                    param: param.name.clone(),
                    count: many.len(),
                }
                .into());
            }
        }
    }

    Ok(Placement {
        selections,
        base,
        fixed,
    })
}

/// Fields to tabulate, after checking every field name the spec mentions
fn check_fields<'a>(
    schema: &'a ResultSchema,
    spec: &'a TableSpec,
) -> Result<Vec<&'a str>, ConfigError> {
    let fields: Vec<&str> = match &spec.fields {
        Some(fields) => {
            let mut seen = FxHashSet::default();
            for field in fields {
                if schema.position(field).is_none() {
                    return Err(ConfigError::UnknownField(field.clone()));
                }
                if !seen.insert(field.as_str()) {
                    return Err(ConfigError::DuplicateField(field.clone()));
                }
            }
            fields.iter().map(String::as_str).collect()
        }
        None => schema.fields().iter().map(String::as_str).collect(),
    };
    for field in spec.collapse.fields().chain(spec.transform.fields()) {
        if schema.position(field).is_none() {
            return Err(ConfigError::UnknownField(field.to_string()));
        }
    }
    Ok(fields)
}

/// Grid positions of `wanted`, sorted into grid order
fn select_positions(
    param: &str,
    values: &[ParamValue],
    wanted: &[ParamValue],
) -> Result<Vec<usize>, AggregationError> {
    let mut positions = Vec::with_capacity(wanted.len());
    for value in wanted {
        let position = values
            .iter()
            .position(|v| v.same_as(value))
            .ok_or_else(|| AggregationError::UnknownValue {
                param: param.to_string(),
                value: value.clone(),
            })?;
        positions.push(position);
    }
    positions.sort_unstable();
    positions.dedup();
    if positions.is_empty() {
        return Err(AggregationError::EmptySelection(param.to_string()));
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_positions_keeps_grid_order() {
        let values: Vec<ParamValue> = [0.0, 0.2, 0.4, 0.6]
            .into_iter()
            .map(ParamValue::from)
            .collect();
        let wanted = vec![ParamValue::Float(0.6), ParamValue::Int(0), ParamValue::Float(0.6)];
        assert_eq!(select_positions("loc", &values, &wanted), Ok(vec![0, 3]));
    }

    #[test]
    fn test_select_positions_rejects_unknown_and_empty() {
        let values = vec![ParamValue::Int(1), ParamValue::Int(2)];
        assert_eq!(
            select_positions("n", &values, &[ParamValue::Int(3)]),
            Err(AggregationError::UnknownValue {
                param: "n".into(),
                value: ParamValue::Int(3)
            })
        );
        assert_eq!(
            select_positions("n", &values, &[]),
            Err(AggregationError::EmptySelection("n".into()))
        );
    }
}
