use super::types::{ScenarioMetric, SharedMetric, SimulationStatistics, Summary, Trajectory};

pub const PERCENTILES: [f64; 5] = [0.05, 0.25, 0.50, 0.75, 0.95];

/// Mean, population stddev and nearest-rank percentiles of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub mean: f64,
    pub stddev: f64,
    pub p5: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
}

impl FieldStats {
    /// Sorts `values` in place. Empty input yields all zeros.
    pub fn describe(values: &mut [f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                stddev: 0.0,
                p5: 0.0,
                p25: 0.0,
                median: 0.0,
                p75: 0.0,
                p95: 0.0,
            };
        }

        values.sort_by(|a, b| a.total_cmp(b));
        let sorted: &[f64] = values;
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let [p5, p25, median, p75, p95] = PERCENTILES.map(|p| percentile(sorted, p));

        Self {
            mean,
            stddev: variance.sqrt(),
            p5,
            p25,
            median,
            p75,
            p95,
        }
    }

    fn values(self) -> [f64; 7] {
        [
            self.mean,
            self.stddev,
            self.p5,
            self.p25,
            self.median,
            self.p75,
            self.p95,
        ]
    }
}

/// Nearest-rank percentile: `sorted[floor(n * p)]`, index clamped to the slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * p).floor().max(0.0) as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Reduces every trajectory summary to summary-shaped statistics. The scenario
/// set is taken from the first trajectory. `None` when there is nothing to
/// aggregate.
pub fn aggregate(trajectories: &[Trajectory]) -> Option<SimulationStatistics> {
    let first = trajectories.first()?;
    let mut stats = SimulationStatistics {
        count: trajectories.len(),
        mean: Summary::default(),
        stddev: Summary::default(),
        p5: Summary::default(),
        p25: Summary::default(),
        median: Summary::default(),
        p75: Summary::default(),
        p95: Summary::default(),
    };

    let mut values = Vec::with_capacity(trajectories.len());
    for name in first.summary.scenarios.keys() {
        for metric in ScenarioMetric::ALL {
            values.clear();
            values.extend(
                trajectories
                    .iter()
                    .filter_map(|t| t.summary.scenarios.get(name))
                    .map(|s| metric.get(s)),
            );
            let described = FieldStats::describe(&mut values);
            for (summary, value) in summaries_mut(&mut stats).into_iter().zip(described.values()) {
                metric.set(summary.scenarios.entry(name.clone()).or_default(), value);
            }
        }
    }

    for metric in SharedMetric::ALL {
        values.clear();
        values.extend(trajectories.iter().map(|t| metric.get(&t.summary)));
        let described = FieldStats::describe(&mut values);
        for (summary, value) in summaries_mut(&mut stats).into_iter().zip(described.values()) {
            metric.set(summary, value);
        }
    }

    Some(stats)
}

fn summaries_mut(stats: &mut SimulationStatistics) -> [&mut Summary; 7] {
    [
        &mut stats.mean,
        &mut stats.stddev,
        &mut stats.p5,
        &mut stats.p25,
        &mut stats.median,
        &mut stats.p75,
        &mut stats.p95,
    ]
}
