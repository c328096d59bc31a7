//! Study files
//!
//! A study file is YAML naming a built-in trial, its parameter grid and the
//! run options. An optional `table` section describes how to print the result.
//!
//! ```yaml
//! trial: z_test
//! repetitions: 1000
//! raw: false
//! seed: 42
//! grid:
//!   n: [10, 50, 100, 500]
//!   loc: [0.0, 0.2, 0.4, 0.6, 0.8, 1.0]
//!   scale: [1, 2]
//! table:
//!   rows: [n]
//!   cols: [loc, scale]
//!   digits: 3
//! ```

use std::path::Path;

use color_eyre::eyre::WrapErr;
use gridstudy_core::study::DEFAULT_MAX_GRID_SIZE;
use gridstudy_core::{
    ConfigError, Exports, FieldLayout, ParameterGrid, PivotError, Reduction, ResultSchema,
    StudyConfig, TableSpec, Transform,
};
use serde::{Deserialize, Serialize};

use crate::trials::BuiltinTrial;

fn default_repetitions() -> usize {
    100
}

fn default_degree() -> usize {
    1
}

fn default_max_grid_size() -> usize {
    DEFAULT_MAX_GRID_SIZE
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyFile {
    pub trial: BuiltinTrial,
    pub grid: ParameterGrid,
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    #[serde(default = "default_degree")]
    pub degree: usize,
    #[serde(default = "default_max_grid_size")]
    pub max_grid_size: usize,
    /// Keep the repetition axis in the saved result
    #[serde(default = "default_true")]
    pub raw: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub exports: Exports,
    /// Expected result fields, checked on every trial
    #[serde(default)]
    pub schema: Option<Vec<String>>,
    #[serde(default)]
    pub table: Option<TableSection>,
}

impl StudyFile {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }

    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read study file {}", path.display()))?;
        Self::from_yaml(&content)
            .wrap_err_with(|| format!("Failed to parse study file {}", path.display()))
    }

    pub fn study_config(&self) -> Result<StudyConfig, ConfigError> {
        let mut config = StudyConfig::new(self.repetitions)
            .degree(self.degree)
            .max_grid_size(self.max_grid_size)
            .raw(self.raw)
            .exports(self.exports.clone());
        if let Some(seed) = self.seed {
            config = config.seed(seed);
        }
        if let Some(fields) = &self.schema {
            config = config.schema(ResultSchema::new(fields.iter().cloned())?);
        }
        Ok(config)
    }

    /// Table layout from the `table` section, or every parameter on the rows
    pub fn table_spec(&self) -> Result<TableSpec, ConfigError> {
        match &self.table {
            Some(section) => section.to_spec(),
            None => Ok(default_table_spec(&self.grid)),
        }
    }

    /// Table layout, checked against the grid and the expected result fields
    /// so that a bad `table` section fails before the study runs
    pub fn checked_table_spec(&self) -> Result<TableSpec, PivotError> {
        let spec = self.table_spec()?;
        let schema = match &self.schema {
            Some(fields) => ResultSchema::new(fields.iter().cloned())?,
            None => ResultSchema::new(self.trial.fields().iter().copied())?,
        };
        spec.check(&self.grid, Some(&schema))?;
        Ok(spec)
    }
}

/// Rows in reverse declared order so the table reads like the array
pub fn default_table_spec(grid: &ParameterGrid) -> TableSpec {
    let mut rows: Vec<&str> = grid.names().collect();
    rows.reverse();
    TableSpec::new().rows(rows)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSection {
    #[serde(default)]
    pub rows: Vec<String>,
    #[serde(default)]
    pub cols: Vec<String>,
    #[serde(default)]
    pub digits: Option<usize>,
    /// Reduction name for every field (`mean`, `median`, `sd`, ...)
    #[serde(default)]
    pub collapse: Option<String>,
    /// Transform name for every field (`identity`, `percent`, `scale=<k>`)
    #[serde(default)]
    pub transform: Option<String>,
    /// Value subsets, keyed by parameter
    #[serde(default)]
    pub partial: ParameterGrid,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub layout: FieldLayout,
    #[serde(default)]
    pub width_scale: Option<f64>,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
}

impl TableSection {
    pub fn to_spec(&self) -> Result<TableSpec, ConfigError> {
        let mut spec = TableSpec::new()
            .rows(self.rows.iter().cloned())
            .cols(self.cols.iter().cloned())
            .layout(self.layout)
            .include_metadata(self.include_metadata);
        if let Some(digits) = self.digits {
            spec = spec.digits(digits);
        }
        if let Some(name) = &self.collapse {
            spec = spec.collapse(name.parse::<Reduction>()?);
        }
        if let Some(name) = &self.transform {
            spec = spec.transform(name.parse::<Transform>()?);
        }
        for param in self.partial.params() {
            spec = spec.partial(param.name.clone(), param.values.iter().cloned());
        }
        if let Some(fields) = &self.fields {
            spec = spec.fields(fields.iter().cloned());
        }
        if let Some(scale) = self.width_scale {
            spec = spec.width_scale(scale);
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridstudy_core::ParamValue;

    const STUDY: &str = r#"
trial: z_test
repetitions: 1000
raw: false
seed: 42
grid:
  n: [10, 50, 100, 500]
  loc: [0.0, 0.2, 0.4, 0.6, 0.8, 1.0]
  scale: [1, 2]
table:
  rows: [n]
  cols: [loc, scale]
  digits: 3
  collapse: median
  partial:
    loc: [0.0, 0.6, 1.0]
"#;

    #[test]
    fn test_parse_study_file() {
        let file = StudyFile::from_yaml(STUDY).unwrap();
        assert_eq!(file.trial, BuiltinTrial::ZTest);
        assert_eq!(file.grid.names().collect::<Vec<_>>(), vec!["n", "loc", "scale"]);
        assert_eq!(file.grid.shape(), vec![4, 6, 2]);
        assert_eq!(file.degree, 1);
        assert_eq!(file.max_grid_size, 1000);

        let config = file.study_config().unwrap();
        assert_eq!(config.repetitions, 1000);
        assert_eq!(config.seed, Some(42));
        assert!(!config.raw);
    }

    #[test]
    fn test_table_section_to_spec() {
        let file = StudyFile::from_yaml(STUDY).unwrap();
        let spec = file.table_spec().unwrap();
        assert_eq!(spec.rows, vec!["n"]);
        assert_eq!(spec.cols, vec!["loc", "scale"]);
        assert_eq!(spec.digits, 3);
        assert_eq!(spec.collapse.all.name(), "median");
        assert_eq!(spec.partial_grid.len(), 1);
        assert_eq!(spec.partial_grid[0].1.len(), 3);
        assert!(spec.partial_grid[0].1[2].same_as(&ParamValue::Int(1)));
    }

    #[test]
    fn test_defaults_and_default_table() {
        let yaml = "trial: normal_moments\ngrid:\n  n: [10]\n  loc: [0.0]\n  scale: [1.0]\n";
        let file = StudyFile::from_yaml(yaml).unwrap();
        assert_eq!(file.repetitions, 100);
        assert!(file.raw);
        assert!(file.exports.is_empty());
        let spec = file.table_spec().unwrap();
        assert_eq!(spec.rows, vec!["scale", "loc", "n"]);
        assert!(spec.cols.is_empty());
    }

    #[test]
    fn test_bad_names_are_reported() {
        let yaml = "trial: z_test\ngrid:\n  n: [10]\ntable:\n  collapse: mode\n";
        let file = StudyFile::from_yaml(yaml).unwrap();
        assert_eq!(
            file.table_spec().unwrap_err(),
            ConfigError::UnknownReduction("mode".into())
        );
        assert!(StudyFile::from_yaml("trial: t_test\ngrid:\n  n: [10]\n").is_err());
        assert!(StudyFile::from_yaml("trial: z_test\ngrid:\n  n: [10]\nrepeats: 3\n").is_err());
    }

    #[test]
    fn test_checked_table_spec_uses_grid_and_trial_fields() {
        let file = StudyFile::from_yaml(STUDY).unwrap();
        assert!(file.checked_table_spec().is_ok());

        let check = |table: &str| {
            let yaml = format!("trial: normal_moments\ngrid:\n  n: [10, 20]\ntable:\n{table}");
            StudyFile::from_yaml(&yaml).unwrap().checked_table_spec()
        };
        assert!(check("  rows: [n]\n  fields: [sd]\n").is_ok());
        assert_eq!(
            check("  rows: [nn]\n").unwrap_err(),
            PivotError::Config(ConfigError::UnknownParameter("nn".into()))
        );
        assert_eq!(
            check("  rows: [n]\n  fields: [decision]\n").unwrap_err(),
            PivotError::Config(ConfigError::UnknownField("decision".into()))
        );
        assert_eq!(
            check("  rows: [n]\n  collapse: mode\n").unwrap_err(),
            PivotError::Config(ConfigError::UnknownReduction("mode".into()))
        );
    }

    #[test]
    fn test_schema_and_exports() {
        let yaml =
            "trial: z_test\ngrid:\n  n: [10]\nschema: [decision]\nexports:\n  alpha: 0.05\n";
        let file = StudyFile::from_yaml(yaml).unwrap();
        let config = file.study_config().unwrap();
        assert_eq!(config.schema.unwrap().fields(), ["decision"]);
        assert_eq!(config.exports.get::<f64>("alpha").unwrap(), 0.05);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.yaml");
        std::fs::write(&path, STUDY).unwrap();
        assert_eq!(StudyFile::load(&path).unwrap().repetitions, 1000);
        assert!(StudyFile::load(&dir.path().join("missing.yaml")).is_err());
    }
}
