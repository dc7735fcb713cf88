use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, warn};

use super::error::EngineError;
use super::portfolio::CorrelatedReturns;
use super::representative::select_representative;
use super::statistics::aggregate;
use super::time_series::extract_time_series;
use super::trajectory::simulate_trajectory;
use super::types::{
    InputParameters, SimulationStatistics, TimeSeriesPoint, Trajectory, YearlyMetric,
};
use super::validation::validate_inputs;

/// Trajectories per seeded chunk. Chunk `k` draws its trajectory seeds from
/// `base_seed + k`, so output depends on the seed only, never on pool size.
pub const CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Dedicated pool size; `None` runs on the global rayon pool.
    pub workers: Option<usize>,
    /// Report progress every this many completed trajectories.
    pub progress_interval: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: None,
            progress_interval: 100,
        }
    }
}

/// Cooperative early-exit flag, checked between trajectories.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct SimulationRun {
    /// Completed trajectories, ordered by `Trajectory::id`.
    pub trajectories: Vec<Trajectory>,
    pub requested: usize,
    pub cancelled: bool,
}

impl SimulationRun {
    pub fn statistics(&self) -> Option<SimulationStatistics> {
        aggregate(&self.trajectories)
    }

    pub fn representative(&self, stats: &SimulationStatistics) -> Option<&Trajectory> {
        select_representative(&self.trajectories, stats).map(|idx| &self.trajectories[idx])
    }

    pub fn time_series(&self, metric: YearlyMetric, start_year: i32) -> Vec<TimeSeriesPoint> {
        extract_time_series(&self.trajectories, metric, start_year)
    }
}

pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Sync);

pub fn run_simulations(
    inputs: &InputParameters,
    options: &RunOptions,
    progress: Option<ProgressFn<'_>>,
    cancel: Option<&CancelToken>,
) -> Result<SimulationRun, EngineError> {
    validate_inputs(inputs)?;
    let returns = inputs
        .portfolio
        .as_ref()
        .map(CorrelatedReturns::new)
        .transpose()?;

    let total = inputs.simulations as usize;
    let base_seed = inputs.seed.unwrap_or_else(|| rand::thread_rng().r#gen());
    let chunk_count = total.div_ceil(CHUNK_SIZE);
    let reporter = ProgressReporter::new(total, options.progress_interval, progress);

    info!(
        simulations = total,
        scenarios = inputs.scenarios.len(),
        years = inputs.years,
        workers = ?options.workers,
        seeded = inputs.seed.is_some(),
        "starting monte carlo run"
    );

    let work = || -> Vec<Vec<Trajectory>> {
        (0..chunk_count)
            .into_par_iter()
            .map(|chunk| {
                run_chunk(
                    inputs,
                    returns.as_ref(),
                    chunk,
                    total,
                    base_seed,
                    &reporter,
                    cancel,
                )
            })
            .collect()
    };

    let chunks = match options.workers {
        Some(workers) => rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?
            .install(work),
        None => work(),
    };

    let trajectories: Vec<Trajectory> = chunks.into_iter().flatten().collect();
    let cancelled = trajectories.len() < total;
    reporter.finish(trajectories.len());

    if cancelled {
        warn!(
            completed = trajectories.len(),
            requested = total,
            "monte carlo run cancelled"
        );
    } else {
        info!(completed = trajectories.len(), "monte carlo run finished");
    }

    Ok(SimulationRun {
        trajectories,
        requested: total,
        cancelled,
    })
}

fn run_chunk(
    inputs: &InputParameters,
    returns: Option<&CorrelatedReturns>,
    chunk: usize,
    total: usize,
    base_seed: u64,
    reporter: &ProgressReporter<'_>,
    cancel: Option<&CancelToken>,
) -> Vec<Trajectory> {
    let start = chunk * CHUNK_SIZE;
    let end = (start + CHUNK_SIZE).min(total);
    let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(chunk as u64));

    let mut out = Vec::with_capacity(end - start);
    for id in start..end {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            break;
        }
        let seed = rng.next_u64();
        out.push(simulate_trajectory(inputs, returns, id, seed));
        reporter.record();
    }

    debug!(chunk, completed = out.len(), "chunk finished");
    out
}

/// Percentages handed to the callback never decrease. Workers that find the
/// reporter busy skip their report instead of waiting.
struct ProgressReporter<'a> {
    total: usize,
    interval: usize,
    completed: AtomicUsize,
    last_reported: Mutex<f64>,
    callback: Option<ProgressFn<'a>>,
}

impl<'a> ProgressReporter<'a> {
    fn new(total: usize, interval: usize, callback: Option<ProgressFn<'a>>) -> Self {
        Self {
            total,
            interval: interval.max(1),
            completed: AtomicUsize::new(0),
            last_reported: Mutex::new(0.0),
            callback,
        }
    }

    fn percent(&self, done: usize) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (done as f64 * 100.0 / self.total as f64).min(100.0)
    }

    fn record(&self) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        let Some(callback) = self.callback else {
            return;
        };
        if done % self.interval != 0 {
            return;
        }
        let Ok(mut last) = self.last_reported.try_lock() else {
            return;
        };
        let pct = self.percent(done);
        if pct > *last {
            *last = pct;
            callback(pct);
        }
    }

    fn finish(&self, done: usize) {
        let Some(callback) = self.callback else {
            return;
        };
        let mut last = self
            .last_reported
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let pct = self.percent(done);
        if pct >= *last {
            *last = pct;
            callback(pct);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ConfigError;
    use crate::core::trajectory::fixtures::stochastic_inputs;

    fn small_inputs(simulations: u32) -> InputParameters {
        let mut inputs = stochastic_inputs();
        inputs.years = 8;
        inputs.simulations = simulations;
        inputs
    }

    #[test]
    fn returns_requested_number_of_trajectories_in_id_order() {
        let inputs = small_inputs(250);
        let run = run_simulations(&inputs, &RunOptions::default(), None, None).expect("valid");
        assert!(!run.cancelled);
        assert_eq!(run.requested, 250);
        assert_eq!(run.trajectories.len(), 250);
        for (idx, trajectory) in run.trajectories.iter().enumerate() {
            assert_eq!(trajectory.id, idx);
            assert_eq!(trajectory.years.len(), 8);
        }
    }

    #[test]
    fn seeded_runs_are_identical_across_worker_counts() {
        let inputs = small_inputs(230);
        let single = RunOptions {
            workers: Some(1),
            ..RunOptions::default()
        };
        let many = RunOptions {
            workers: Some(4),
            ..RunOptions::default()
        };
        let left = run_simulations(&inputs, &single, None, None).expect("valid");
        let right = run_simulations(&inputs, &many, None, None).expect("valid");
        assert_eq!(left.trajectories, right.trajectories);
        assert_eq!(left.statistics(), right.statistics());
    }

    #[test]
    fn trajectories_are_independent_draws() {
        let run = run_simulations(&small_inputs(20), &RunOptions::default(), None, None)
            .expect("valid");
        let first = run.trajectories[0].years[0].development;
        assert!(
            run.trajectories[1..]
                .iter()
                .any(|t| t.years[0].development != first)
        );
    }

    #[test]
    fn unseeded_run_completes() {
        let mut inputs = small_inputs(30);
        inputs.seed = None;
        let run = run_simulations(&inputs, &RunOptions::default(), None, None).expect("valid");
        assert_eq!(run.trajectories.len(), 30);
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_one_hundred() {
        let inputs = small_inputs(1_000);
        let seen = Mutex::new(Vec::new());
        let on_progress = |pct: f64| seen.lock().expect("lock").push(pct);
        let options = RunOptions {
            workers: Some(4),
            progress_interval: 100,
        };
        run_simulations(&inputs, &options, Some(&on_progress), None).expect("valid");

        let seen = seen.into_inner().expect("lock");
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert!(seen.iter().all(|p| (0.0..=100.0).contains(p)));
        assert_eq!(seen.last().copied(), Some(100.0));
    }

    #[test]
    fn invalid_configuration_fails_before_any_progress() {
        let mut inputs = small_inputs(10);
        inputs.scenarios.clear();
        let calls = AtomicUsize::new(0);
        let on_progress = |_: f64| {
            calls.fetch_add(1, Ordering::Relaxed);
        };
        let err = run_simulations(&inputs, &RunOptions::default(), Some(&on_progress), None)
            .expect_err("no scenarios");
        assert!(matches!(err, EngineError::Config(ConfigError::NoScenarios)));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn cancelled_before_start_returns_empty_partial_run() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let run = run_simulations(&small_inputs(300), &RunOptions::default(), None, Some(&cancel))
            .expect("valid");
        assert!(run.cancelled);
        assert!(run.trajectories.is_empty());
        assert!(run.statistics().is_none());
    }

    #[test]
    fn cancellation_mid_run_keeps_valid_partial_results() {
        let inputs = small_inputs(2_000);
        let cancel = CancelToken::new();
        let on_progress = |pct: f64| {
            if pct >= 10.0 {
                cancel.cancel();
            }
        };
        let options = RunOptions {
            workers: Some(2),
            progress_interval: 50,
        };
        let run = run_simulations(&inputs, &options, Some(&on_progress), Some(&cancel))
            .expect("valid");

        assert!(run.cancelled);
        assert!(!run.trajectories.is_empty());
        assert!(run.trajectories.len() < 2_000);
        assert!(run.trajectories.windows(2).all(|w| w[0].id < w[1].id));

        let full = run_simulations(&inputs, &RunOptions::default(), None, None).expect("valid");
        for partial in &run.trajectories {
            assert_eq!(partial, &full.trajectories[partial.id]);
        }

        let stats = run.statistics().expect("partial statistics");
        assert_eq!(stats.count, run.trajectories.len());
        assert!(run.representative(&stats).is_some());
    }
}
