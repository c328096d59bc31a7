//! Fan-out of independent tasks, sequentially or across a rayon pool.
//!
//! Tasks never talk to each other. Each result is tagged with its task by the
//! caller, so the order results come back in does not matter downstream.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{ConfigError, StudyError};

/// Progress tracking for a running study
#[derive(Debug, Clone)]
pub struct StudyProgress {
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl StudyProgress {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(total)),
        }
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Completed share in `[0, 1]`; an empty run counts as done
    #[must_use]
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            1.0
        } else {
            self.completed() as f64 / total as f64
        }
    }

    pub fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }
}

impl Default for StudyProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Runs a worker function over a task list with a fixed degree of parallelism
#[derive(Debug, Clone)]
pub struct Dispatcher {
    degree: usize,
    progress: Option<StudyProgress>,
}

impl Dispatcher {
    pub fn new(degree: usize) -> Result<Self, ConfigError> {
        if degree == 0 {
            return Err(ConfigError::ZeroDegree);
        }
        Ok(Self {
            degree,
            progress: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: StudyProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Apply `worker` to every task. Output order matches task order.
    pub fn map_over<I, O, F>(&self, tasks: &[I], worker: F) -> Result<Vec<O>, StudyError>
    where
        I: Sync,
        O: Send,
        F: Fn(&I) -> O + Send + Sync,
    {
        if self.degree == 1 || tasks.len() <= 1 {
            return Ok(tasks.iter().map(|t| self.tracked(&worker, t)).collect());
        }
        self.map_parallel(tasks, worker)
    }

    #[cfg(feature = "parallel")]
    fn map_parallel<I, O, F>(&self, tasks: &[I], worker: F) -> Result<Vec<O>, StudyError>
    where
        I: Sync,
        O: Send,
        F: Fn(&I) -> O + Send + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.degree)
            .thread_name(|i| format!("gridstudy-worker-{i}"))
            .build()
            .map_err(|e| StudyError::Pool(e.to_string()))?;

        Ok(pool.install(|| {
            tasks
                .par_iter()
                .map(|t| self.tracked(&worker, t))
                .collect()
        }))
    }

    #[cfg(not(feature = "parallel"))]
    fn map_parallel<I, O, F>(&self, tasks: &[I], worker: F) -> Result<Vec<O>, StudyError>
    where
        I: Sync,
        O: Send,
        F: Fn(&I) -> O + Send + Sync,
    {
        tracing::warn!(
            degree = self.degree,
            "built without the `parallel` feature, running sequentially"
        );
        Ok(tasks.iter().map(|t| self.tracked(&worker, t)).collect())
    }

    fn tracked<I, O, F>(&self, worker: &F, task: &I) -> O
    where
        F: Fn(&I) -> O,
    {
        let out = worker(task);
        if let Some(p) = &self.progress {
            p.increment();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_zero_degree_rejected() {
        assert_eq!(Dispatcher::new(0).unwrap_err(), ConfigError::ZeroDegree);
    }

    #[test]
    fn test_sequential_preserves_order() {
        let seen = Mutex::new(Vec::new());
        let dispatcher = Dispatcher::new(1).unwrap();
        let out = dispatcher
            .map_over(&[3, 1, 2], |t| {
                seen.lock().unwrap().push(*t);
                t * 10
            })
            .unwrap();
        assert_eq!(out, vec![30, 10, 20]);
        assert_eq!(*seen.lock().unwrap(), vec![3, 1, 2]);
    }

    #[test]
    fn test_parallel_output_matches_tasks() {
        let tasks: Vec<usize> = (0..200).collect();
        let dispatcher = Dispatcher::new(4).unwrap();
        let out = dispatcher.map_over(&tasks, |t| t * 2).unwrap();
        assert_eq!(out, tasks.iter().map(|t| t * 2).collect::<Vec<_>>());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_uses_named_pool_threads() {
        use std::collections::HashSet;

        let names = Mutex::new(HashSet::new());
        let tasks: Vec<usize> = (0..64).collect();
        Dispatcher::new(3)
            .unwrap()
            .map_over(&tasks, |_| {
                let name = std::thread::current().name().map(str::to_string);
                names.lock().unwrap().insert(name);
            })
            .unwrap();
        let names = names.into_inner().unwrap();
        assert!(!names.is_empty() && names.len() <= 3);
        assert!(
            names
                .iter()
                .all(|n| n.as_deref().is_some_and(|n| n.starts_with("gridstudy-worker-")))
        );
    }

    #[test]
    fn test_progress_counts_every_task() {
        let progress = StudyProgress::new(50);
        let tasks: Vec<usize> = (0..50).collect();
        Dispatcher::new(2)
            .unwrap()
            .with_progress(progress.clone())
            .map_over(&tasks, |t| *t)
            .unwrap();
        assert_eq!(progress.completed(), 50);
        assert_eq!(progress.fraction(), 1.0);
    }
}
