//! The trial contract and the runner that isolates trial failures.
//!
//! A trial is any `Fn(&ParamSet, &TrialContext) -> Result<TrialResult, TrialError>`.
//! The runner hands each invocation its own parameter copy and a context with
//! a deterministic per-task seed, then turns errors and panics into a
//! [`TrialFailure`] so one bad draw never aborts a study.
//!
//! The first run wraps the process panic hook. Panics raised while a trial
//! is running on the current thread skip the previous hook, so they show up
//! once as a failure instead of as a backtrace on stderr. Panics anywhere
//! else still reach the previous hook.

use std::any::Any;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Once};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, TrialError, TrialFailure, TrialFailureKind};
use crate::grid::{ParamSet, ParameterGrid};
use crate::model::{CombinationIndex, TaskDescriptor, TaskId, TrialResult};

/// A user-defined stochastic experiment
pub trait Trial: Send + Sync {
    fn run(&self, params: &ParamSet, ctx: &TrialContext) -> Result<TrialResult, TrialError>;
}

impl<F> Trial for F
where
    F: Fn(&ParamSet, &TrialContext) -> Result<TrialResult, TrialError> + Send + Sync,
{
    fn run(&self, params: &ParamSet, ctx: &TrialContext) -> Result<TrialResult, TrialError> {
        self(params, ctx)
    }
}

/// Pin a closure to the trial signature so argument and error types infer.
///
/// ```ignore
/// let trial = trial_fn(|params, ctx| {
///     let n = params.usize("n")?;
///     Ok(TrialResult::single("n", n as f64))
/// });
/// ```
pub fn trial_fn<F>(f: F) -> F
where
    F: Fn(&ParamSet, &TrialContext) -> Result<TrialResult, TrialError> + Send + Sync,
{
    f
}

/// Read-only auxiliary data shipped to every worker.
///
/// Values are stored as JSON so the bundle is explicit and serializable;
/// trials decode what they need with [`Exports::get`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Exports {
    values: BTreeMap<String, serde_json::Value>,
}

impl Exports {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Serialize>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        self.values.insert(name.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Builder form of [`Exports::insert`]
    pub fn with<T: Serialize>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        self.insert(name, value)?;
        Ok(self)
    }

    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&serde_json::Value> {
        self.values.get(name)
    }

    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ExportError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| ExportError::Missing(name.to_string()))?;
        T::deserialize(value).map_err(|source| ExportError::Decode {
            name: name.to_string(),
            source,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a trial may know about the task it is running
#[derive(Debug, Clone)]
pub struct TrialContext {
    pub task: TaskId,
    pub combination: CombinationIndex,
    pub repetition: usize,
    /// Deterministic per-task seed
    pub seed: u64,
    exports: Arc<Exports>,
}

impl TrialContext {
    /// Fresh generator seeded for this task
    #[must_use]
    pub fn rng(&self) -> SmallRng {
        SmallRng::seed_from_u64(self.seed)
    }

    #[must_use]
    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    pub fn export<T: DeserializeOwned>(&self, name: &str) -> Result<T, ExportError> {
        self.exports.get(name)
    }
}

/// A task together with what came back from running it
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub task: TaskDescriptor,
    pub result: Result<TrialResult, TrialFailure>,
}

/// Runs one task of a trial against a grid.
pub struct TrialRunner<'a, T: ?Sized> {
    trial: &'a T,
    grid: &'a ParameterGrid,
    exports: Arc<Exports>,
    base_seed: u64,
}

impl<'a, T: Trial + ?Sized> TrialRunner<'a, T> {
    pub fn new(
        trial: &'a T,
        grid: &'a ParameterGrid,
        exports: Arc<Exports>,
        base_seed: u64,
    ) -> Self {
        Self {
            trial,
            grid,
            exports,
            base_seed,
        }
    }

    /// Invoke the trial once. Errors and panics come back as failures.
    pub fn run(&self, task: &TaskDescriptor) -> TrialOutcome {
        let params = self.grid.param_set(&task.combination);
        let ctx = TrialContext {
            task: task.id,
            combination: task.combination.clone(),
            repetition: task.repetition,
            seed: task_seed(self.base_seed, task.id),
            exports: Arc::clone(&self.exports),
        };

        install_quiet_hook();
        let outer = IN_TRIAL.replace(true);
        let caught = catch_unwind(AssertUnwindSafe(|| self.trial.run(&params, &ctx)));
        IN_TRIAL.set(outer);

        let result = match caught {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(TrialFailure::new(
                task,
                TrialFailureKind::Error(err.to_string()),
            )),
            Err(payload) => Err(TrialFailure::new(
                task,
                TrialFailureKind::Panic(panic_message(payload.as_ref())),
            )),
        };

        TrialOutcome {
            task: task.clone(),
            result,
        }
    }
}

thread_local! {
    static IN_TRIAL: Cell<bool> = const { Cell::new(false) };
}

fn install_quiet_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if !IN_TRIAL.get() {
                previous(info);
            }
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Seed for one task, independent of which worker runs it.
#[must_use]
pub fn task_seed(base_seed: u64, task: TaskId) -> u64 {
    splitmix64(base_seed ^ splitmix64(task.0 as u64))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
