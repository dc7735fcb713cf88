use super::types::{ScenarioMetric, SimulationStatistics, Summary, Trajectory};

/// Outcome metrics compared when looking for a typical trajectory. Each is
/// summed over all scenarios before comparison.
pub const TRACKED_METRICS: [ScenarioMetric; 4] = [
    ScenarioMetric::LiquidationValue,
    ScenarioMetric::RealWithdrawal,
    ScenarioMetric::CumulativeRealWithdrawal,
    ScenarioMetric::MaxDrawdown,
];

const MIN_SPREAD: f64 = 1e-9;

/// Index of the trajectory closest to the aggregate median, measured as the
/// sum of squared z-scores over [`TRACKED_METRICS`]. Ties go to the lowest
/// index.
pub fn select_representative(
    trajectories: &[Trajectory],
    stats: &SimulationStatistics,
) -> Option<usize> {
    let names: Vec<&str> = stats.median.scenarios.keys().map(String::as_str).collect();
    if trajectories.is_empty() || names.is_empty() {
        return None;
    }

    let targets: Vec<(ScenarioMetric, f64, f64)> = TRACKED_METRICS
        .iter()
        .map(|&metric| {
            let median = summed(&stats.median, &names, metric);
            let spread = summed(&stats.stddev, &names, metric);
            let spread = if spread > MIN_SPREAD { spread } else { 1.0 };
            (metric, median, spread)
        })
        .collect();

    trajectories
        .iter()
        .enumerate()
        .map(|(idx, trajectory)| {
            let distance: f64 = targets
                .iter()
                .map(|&(metric, median, spread)| {
                    let z = (summed(&trajectory.summary, &names, metric) - median) / spread;
                    z * z
                })
                .sum();
            (idx, distance)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(idx, _)| idx)
}

fn summed(summary: &Summary, names: &[&str], metric: ScenarioMetric) -> f64 {
    names
        .iter()
        .filter_map(|name| summary.scenarios.get(*name))
        .map(|s| metric.get(s))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::statistics::aggregate;
    use crate::core::trajectory::fixtures::stochastic_inputs;
    use crate::core::trajectory::run_trajectory;
    use crate::core::types::ScenarioSummary;
    use std::collections::BTreeMap;

    fn trajectory(id: usize, a: [f64; 4], b: [f64; 4]) -> Trajectory {
        let mut scenarios = BTreeMap::new();
        for (name, values) in [("A", a), ("B", b)] {
            let mut summary = ScenarioSummary::default();
            for (metric, value) in TRACKED_METRICS.iter().zip(values) {
                metric.set(&mut summary, value);
            }
            scenarios.insert(name.to_string(), summary);
        }
        Trajectory {
            id,
            years: Vec::new(),
            summary: Summary {
                scenarios,
                average_development: 0.0,
                average_inflation: 0.0,
            },
        }
    }

    #[test]
    fn picks_trajectory_sitting_on_the_median() {
        let trajectories = vec![
            trajectory(0, [900.0, 40.0, 800.0, 0.5], [950.0, 30.0, 700.0, 0.4]),
            trajectory(1, [100.0, 10.0, 200.0, 0.1], [150.0, 5.0, 100.0, 0.2]),
            trajectory(2, [500.0, 20.0, 400.0, 0.3], [550.0, 15.0, 300.0, 0.3]),
            trajectory(3, [200.0, 15.0, 300.0, 0.2], [250.0, 10.0, 200.0, 0.25]),
            trajectory(4, [700.0, 30.0, 600.0, 0.4], [750.0, 20.0, 500.0, 0.35]),
        ];
        let stats = aggregate(&trajectories).expect("stats");
        // Trajectory 2 holds the nearest-rank median of every tracked field.
        for metric in TRACKED_METRICS {
            for name in ["A", "B"] {
                assert_eq!(
                    metric.get(&stats.median.scenarios[name]),
                    metric.get(&trajectories[2].summary.scenarios[name])
                );
            }
        }
        assert_eq!(select_representative(&trajectories, &stats), Some(2));
    }

    #[test]
    fn constant_metrics_do_not_divide_by_zero() {
        let trajectories = vec![
            trajectory(0, [1.0; 4], [1.0; 4]),
            trajectory(1, [1.0; 4], [1.0; 4]),
        ];
        let stats = aggregate(&trajectories).expect("stats");
        assert_eq!(select_representative(&trajectories, &stats), Some(0));
    }

    #[test]
    fn empty_inputs_have_no_representative() {
        let trajectories = vec![trajectory(0, [1.0; 4], [2.0; 4])];
        let stats = aggregate(&trajectories).expect("stats");
        assert_eq!(select_representative(&[], &stats), None);

        let mut no_scenarios = stats.clone();
        no_scenarios.median.scenarios.clear();
        assert_eq!(select_representative(&trajectories, &no_scenarios), None);
    }

    #[test]
    fn representative_of_a_real_run_is_near_the_median() {
        let inputs = stochastic_inputs();
        let trajectories: Vec<_> = (0..150)
            .map(|id| run_trajectory(&inputs, id, 1_000 + id as u64).expect("valid"))
            .collect();
        let stats = aggregate(&trajectories).expect("stats");
        let idx = select_representative(&trajectories, &stats).expect("representative");

        let median: f64 = ["A", "B"]
            .iter()
            .map(|n| stats.median.scenarios[*n].liquidation_value)
            .sum();
        let chosen: f64 = ["A", "B"]
            .iter()
            .map(|n| trajectories[idx].summary.scenarios[*n].liquidation_value)
            .sum();
        let spread: f64 = ["A", "B"]
            .iter()
            .map(|n| stats.stddev.scenarios[*n].liquidation_value)
            .sum();
        assert!(
            (chosen - median).abs() <= 2.0 * spread,
            "chosen {chosen}, median {median}"
        );
    }
}
