//! Pre-flight run-time estimation.
//!
//! A small sample of tasks is run and timed, and the elapsed time is scaled
//! linearly to the full task count. The estimate is advisory only: sampled
//! outcomes are discarded and never reach the assembler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StudyError;
use crate::io::atomic_write;
use crate::model::TaskDescriptor;

/// How to sample for a timing estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEstimateConfig {
    /// Repetitions per combination to run in the sample
    pub sample_repetitions: usize,
    /// Write the estimate to `output_dir` as JSON
    pub save: bool,
    pub output_dir: PathBuf,
}

impl Default for TimeEstimateConfig {
    fn default() -> Self {
        Self {
            sample_repetitions: 1,
            save: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl TimeEstimateConfig {
    /// The sampled subset: the first `sample_repetitions` repetitions of every combination
    #[must_use]
    pub fn sample(&self, tasks: &[TaskDescriptor]) -> Vec<TaskDescriptor> {
        tasks
            .iter()
            .filter(|t| t.repetition < self.sample_repetitions.max(1))
            .cloned()
            .collect()
    }
}

/// Result of a timing sample, extrapolated to the full study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEstimate {
    pub sample_tasks: usize,
    pub total_tasks: usize,
    pub degree: usize,
    pub sample_elapsed: Duration,
    pub estimated_total: Duration,
    pub created_at: jiff::Timestamp,
}

impl TimingEstimate {
    /// Linear extrapolation from `sample_tasks` to `total_tasks`
    #[must_use]
    pub fn extrapolate(
        sample_tasks: usize,
        total_tasks: usize,
        degree: usize,
        sample_elapsed: Duration,
    ) -> Self {
        let estimated_total = if sample_tasks == 0 {
            Duration::ZERO
        } else {
            sample_elapsed.mul_f64(total_tasks as f64 / sample_tasks as f64)
        };
        Self {
            sample_tasks,
            total_tasks,
            degree,
            sample_elapsed,
            estimated_total,
            created_at: jiff::Timestamp::now(),
        }
    }

    /// Time still to go once the sample has run
    #[must_use]
    pub fn estimated_remaining(&self) -> Duration {
        self.estimated_total.saturating_sub(self.sample_elapsed)
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "timing_estimate_{}.json",
            self.created_at.strftime("%Y%m%d_%H%M%S")
        )
    }

    /// Write the estimate as pretty JSON into `dir`, returning the file path
    pub fn save(&self, dir: &Path) -> Result<PathBuf, StudyError> {
        let path = dir.join(self.file_name());
        let json = serde_json::to_vec_pretty(self)?;
        atomic_write(&path, &json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CombinationIndex, TaskId};

    #[test]
    fn test_linear_extrapolation() {
        let est = TimingEstimate::extrapolate(10, 1000, 1, Duration::from_millis(20));
        assert_eq!(est.estimated_total, Duration::from_secs(2));
        assert_eq!(est.estimated_remaining(), Duration::from_millis(1980));
    }

    #[test]
    fn test_empty_sample_estimates_zero() {
        let est = TimingEstimate::extrapolate(0, 1000, 1, Duration::ZERO);
        assert_eq!(est.estimated_total, Duration::ZERO);
    }

    #[test]
    fn test_sample_takes_leading_repetitions() {
        let tasks: Vec<TaskDescriptor> = (0..2)
            .flat_map(|c| {
                (0..5).map(move |r| TaskDescriptor {
                    id: TaskId(c * 5 + r),
                    combination: CombinationIndex(vec![c]),
                    repetition: r,
                })
            })
            .collect();
        let config = TimeEstimateConfig {
            sample_repetitions: 2,
            ..Default::default()
        };
        let sample = config.sample(&tasks);
        assert_eq!(
            sample.iter().map(|t| t.id.0).collect::<Vec<_>>(),
            vec![0, 1, 5, 6]
        );
    }

    #[test]
    fn test_save_writes_json_record() {
        let dir = tempfile::tempdir().unwrap();
        let est = TimingEstimate::extrapolate(4, 400, 2, Duration::from_millis(8));
        let path = est.save(dir.path()).unwrap();

        assert!(path.file_name().unwrap().to_string_lossy().starts_with("timing_estimate_"));
        let read: TimingEstimate =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, est);
    }
}
