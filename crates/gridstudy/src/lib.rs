//! Command-line front end for gridstudy
//!
//! Loads YAML study files, runs one of the built-in trials over the declared
//! grid, saves results as JSON and renders pivot tables as plain text.

#![warn(clippy::all)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod render;
pub mod trials;

pub use cli::{Cli, Command};
pub use config::{StudyFile, TableSection};
pub use logging::init_logging;
pub use render::render_table;
pub use trials::BuiltinTrial;
