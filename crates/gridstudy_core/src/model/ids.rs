//! Identifiers for grid points and the tasks dispatched for them

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of one grid point: one entry per parameter, in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombinationIndex(pub Vec<usize>);

impl CombinationIndex {
    #[must_use]
    pub fn positions(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for CombinationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, pos) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{pos}")?;
        }
        f.write_str(")")
    }
}

/// Dense task number: combination-major, repetition-minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub usize);

/// One unit of work: a grid point and the repetition to run there
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub combination: CombinationIndex,
    pub repetition: usize,
}
