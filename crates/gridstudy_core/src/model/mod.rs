//! Data types shared by the grid-execution and pivoting engines

mod ids;
mod results;
mod value;

pub use ids::*;
pub use results::*;
pub use value::*;
