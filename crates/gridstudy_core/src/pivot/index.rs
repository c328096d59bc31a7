//! Hierarchical row and column indices for pivot tables.
//!
//! An axis is declared innermost-first: the first name varies fastest and the
//! last name forms the outermost level of the tree.

use crate::model::ParamValue;

/// One parameter placed on a table axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisLevel {
    pub param: String,
    /// Axis of the parameter in the result array
    pub axis: usize,
    /// Selected grid positions, in grid order
    pub positions: Vec<usize>,
    /// Grid values at `positions`
    pub values: Vec<ParamValue>,
}

impl AxisLevel {
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// A labelled node of an index tree. Leaves have no children and span 1.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexNode {
    pub param: String,
    pub value: ParamValue,
    /// Number of leaf keys underneath
    pub span: usize,
    pub children: Vec<IndexNode>,
}

impl IndexNode {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

fn build_nodes(levels: &[AxisLevel]) -> Vec<IndexNode> {
    let Some((level, rest)) = levels.split_first() else {
        return Vec::new();
    };
    level
        .values
        .iter()
        .map(|value| {
            let children = build_nodes(rest);
            let span = children.iter().map(|c| c.span).sum::<usize>().max(1);
            IndexNode {
                param: level.param.clone(),
                value: value.clone(),
                span,
                children,
            }
        })
        .collect()
}

/// Cartesian index over one table axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisIndex {
    /// Outermost first
    levels: Vec<AxisLevel>,
    roots: Vec<IndexNode>,
    /// Per key, the selected slot of each level (outermost first)
    keys: Vec<Vec<usize>>,
}

impl AxisIndex {
    /// Build from levels in declared (innermost-first) order
    #[must_use]
    pub fn build(mut declared: Vec<AxisLevel>) -> Self {
        declared.reverse();
        let levels = declared;
        let roots = build_nodes(&levels);

        // Row-major over outermost-first levels; an empty axis has one empty key
        let mut keys = vec![Vec::new()];
        for level in &levels {
            keys = keys
                .into_iter()
                .flat_map(|prefix| {
                    (0..level.len()).map(move |slot| {
                        let mut key = prefix.clone();
                        key.push(slot);
                        key
                    })
                })
                .collect();
        }

        Self {
            levels,
            roots,
            keys,
        }
    }

    /// Levels, outermost first
    #[must_use]
    pub fn levels(&self) -> &[AxisLevel] {
        &self.levels
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Number of leaf keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn roots(&self) -> &[IndexNode] {
        &self.roots
    }

    #[must_use]
    pub fn keys(&self) -> &[Vec<usize>] {
        &self.keys
    }

    /// `(param, value)` labels of one key, outermost first
    #[must_use]
    pub fn labels(&self, key: usize) -> Vec<(&str, &ParamValue)> {
        self.keys.get(key).map_or_else(Vec::new, |slots| {
            self.levels
                .iter()
                .zip(slots)
                .map(|(level, &slot)| (level.param.as_str(), &level.values[slot]))
                .collect()
        })
    }

    /// All nodes at `depth` (0 = outermost), left to right
    #[must_use]
    pub fn nodes_at_depth(&self, depth: usize) -> Vec<&IndexNode> {
        let mut frontier: Vec<&IndexNode> = self.roots.iter().collect();
        for _ in 0..depth {
            frontier = frontier.iter().flat_map(|n| n.children.iter()).collect();
        }
        frontier
    }

    /// Write the array coordinates of `key` into `coord`
    pub fn place(&self, key: usize, coord: &mut [usize]) {
        if let Some(slots) = self.keys.get(key) {
            for (level, &slot) in self.levels.iter().zip(slots) {
                coord[level.axis] = level.positions[slot];
            }
        }
    }
}
