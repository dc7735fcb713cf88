use super::types::{TimeSeriesPoint, Trajectory, YearlyMetric};

/// One point per trajectory per year carrying `metric` for every scenario.
pub fn extract_time_series(
    trajectories: &[Trajectory],
    metric: YearlyMetric,
    start_year: i32,
) -> Vec<TimeSeriesPoint> {
    trajectories
        .iter()
        .flat_map(|trajectory| {
            trajectory.years.iter().map(move |record| TimeSeriesPoint {
                trajectory_id: trajectory.id,
                year: start_year + record.year as i32,
                values: record
                    .scenarios
                    .iter()
                    .map(|(name, data)| (name.clone(), metric.get(data)))
                    .collect(),
            })
        })
        .collect()
}
