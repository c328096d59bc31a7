use std::path::Path;

use color_eyre::eyre::{WrapErr, eyre};
use gridstudy_core::io::atomic_write;
use gridstudy_core::{
    FieldLayout, Reduction, StudyOutput, StudyResult, TableSpec, TimeEstimateConfig, Transform,
    make_table, run_study,
};

use crate::cli::{Command, RunArgs, TableArgs};
use crate::config::StudyFile;
use crate::render::render_table;

pub fn execute(command: Command) -> color_eyre::Result<()> {
    match command {
        Command::Run(args) => {
            let StudyRun { output, table } = run(&args)?;
            if let Some(estimate) = &output.estimate {
                println!(
                    "Estimated run time: {:.2}s ({} of {} tasks sampled in {:.2}s, degree {})",
                    estimate.estimated_total.as_secs_f64(),
                    estimate.sample_tasks,
                    estimate.total_tasks,
                    estimate.sample_elapsed.as_secs_f64(),
                    estimate.degree,
                );
            }
            if let Some(spec) = &table {
                let table = make_table(&output.result, spec)?;
                print!("{}", render_table(&table));
            }
            Ok(())
        }
        Command::Table(args) => {
            print!("{}", table(&args)?);
            Ok(())
        }
    }
}

/// A finished study with the table layout that was checked before it ran
pub struct StudyRun {
    pub output: StudyOutput,
    /// `None` when `--no-table` is given
    pub table: Option<TableSpec>,
}

/// Run a study file, saving the result when `--output` is given
pub fn run(args: &RunArgs) -> color_eyre::Result<StudyRun> {
    let file = StudyFile::load(&args.study)?;
    let table = if args.no_table {
        None
    } else {
        Some(file.checked_table_spec()?)
    };
    let mut config = file.study_config()?;
    if let Some(degree) = args.degree {
        config.degree = degree;
    }
    if args.estimate_time || args.save_estimate {
        let output_dir = args
            .output
            .as_deref()
            .and_then(Path::parent)
            .filter(|d| !d.as_os_str().is_empty())
            .map_or_else(|| ".".into(), Path::to_path_buf);
        config.estimate_time = Some(TimeEstimateConfig {
            save: args.save_estimate,
            output_dir,
            ..Default::default()
        });
    }

    tracing::info!(study = %args.study.display(), trial = %file.trial, "Running study");
    let trial = file.trial.function();
    let output = run_study(&trial, &file.grid, &config)?;

    if let Some(path) = &args.output {
        save_result(&output.result, path)?;
        tracing::info!(path = %path.display(), "Saved result");
    }
    Ok(StudyRun { output, table })
}

pub fn save_result(result: &StudyResult, path: &Path) -> color_eyre::Result<()> {
    let json = serde_json::to_vec_pretty(result)?;
    atomic_write(path, &json).wrap_err_with(|| format!("Failed to write {}", path.display()))
}

pub fn load_result(path: &Path) -> color_eyre::Result<StudyResult> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read result file {}", path.display()))?;
    serde_json::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse result file {}", path.display()))
}

pub fn table_spec(args: &TableArgs) -> color_eyre::Result<TableSpec> {
    if args.rows.is_empty() && args.cols.is_empty() {
        return Err(eyre!("at least one of --rows or --cols is required"));
    }
    let mut spec = TableSpec::new()
        .rows(args.rows.iter().cloned())
        .cols(args.cols.iter().cloned())
        .include_metadata(!args.no_metadata);
    if let Some(digits) = args.digits {
        spec = spec.digits(digits);
    }
    if let Some(name) = &args.collapse {
        spec = spec.collapse(name.parse::<Reduction>()?);
    }
    if let Some(name) = &args.transform {
        spec = spec.transform(name.parse::<Transform>()?);
    }
    for (param, values) in &args.partial {
        spec = spec.partial(param.clone(), values.iter().cloned());
    }
    if !args.fields.is_empty() {
        spec = spec.fields(args.fields.iter().cloned());
    }
    if args.separate {
        spec = spec.layout(FieldLayout::Separate);
    }
    if let Some(scale) = args.width_scale {
        spec = spec.width_scale(scale);
    }
    Ok(spec)
}

/// Render a saved result as a table
pub fn table(args: &TableArgs) -> color_eyre::Result<String> {
    let result = load_result(&args.results)?;
    let table = make_table(&result, &table_spec(args)?)?;
    Ok(render_table(&table))
}
