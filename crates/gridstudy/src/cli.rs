use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gridstudy_core::ParamValue;

#[derive(Parser, Debug)]
#[command(name = "gridstudy")]
#[command(about = "Run simulation studies over parameter grids and tabulate the results")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the study described by a YAML file
    Run(RunArgs),
    /// Pivot a saved result file into a table
    Table(TableArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Study file (YAML)
    pub study: PathBuf,

    /// Worker threads, overriding the study file
    #[arg(short, long)]
    pub degree: Option<usize>,

    /// Save the result as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Time a sample of the tasks first and report the expected run time
    #[arg(long)]
    pub estimate_time: bool,

    /// Also write the timing estimate as JSON (implies --estimate-time)
    #[arg(long)]
    pub save_estimate: bool,

    /// Do not print a table after the run
    #[arg(long)]
    pub no_table: bool,
}

#[derive(Args, Debug)]
pub struct TableArgs {
    /// Result file written by `gridstudy run --output`
    pub results: PathBuf,

    /// Row parameters, innermost first
    #[arg(long, value_delimiter = ',')]
    pub rows: Vec<String>,

    /// Column parameters, innermost first
    #[arg(long, value_delimiter = ',')]
    pub cols: Vec<String>,

    /// Fields to show (default: all)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    #[arg(long)]
    pub digits: Option<usize>,

    /// Reduction over repetitions: mean, median, sum, min, max, sd, identity
    #[arg(long)]
    pub collapse: Option<String>,

    /// Transform applied to each cell: identity, percent, scale=<k>
    #[arg(long)]
    pub transform: Option<String>,

    /// Value subset for a parameter, as `name=v1,v2` (repeatable)
    #[arg(long = "partial", value_parser = parse_partial)]
    pub partial: Vec<(String, Vec<ParamValue>)>,

    /// One table per field instead of side by side
    #[arg(long)]
    pub separate: bool,

    #[arg(long)]
    pub width_scale: Option<f64>,

    /// Leave out the run summary
    #[arg(long)]
    pub no_metadata: bool,
}

/// Parse `name=v1,v2,...` into a parameter name and its values
pub fn parse_partial(s: &str) -> Result<(String, Vec<ParamValue>), String> {
    let (name, values) = s
        .split_once('=')
        .ok_or_else(|| format!("expected `name=v1,v2`, got `{s}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in `{s}`"));
    }
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| match v.parse::<ParamValue>() {
            Ok(value) => value,
            Err(never) => match never {},
        })
        .collect();
    Ok((name.to_string(), values))
}
