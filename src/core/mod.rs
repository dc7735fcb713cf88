mod error;
mod monte_carlo;
mod portfolio;
mod representative;
mod sampler;
mod scenario;
mod statistics;
mod time_series;
mod trajectory;
mod types;
mod validation;

pub use error::{ConfigError, EngineError};
pub use monte_carlo::{CHUNK_SIZE, CancelToken, ProgressFn, RunOptions, SimulationRun, run_simulations};
pub use portfolio::CorrelatedReturns;
pub use representative::{TRACKED_METRICS, select_representative};
pub use sampler::{BoxMuller, GaussianSource};
pub use scenario::{ScenarioState, YearContext};
pub use statistics::{FieldStats, PERCENTILES, aggregate, percentile};
pub use time_series::extract_time_series;
pub use trajectory::run_trajectory;
pub use types::{
    Asset, InputParameters, Portfolio, ScenarioConfig, ScenarioMetric, ScenarioSummary,
    ScenarioYearlyData, SharedMetric, SimulationStatistics, Summary, TaxModel, TimeSeriesPoint,
    Trajectory, YearlyMetric, YearlyRecord,
};
pub use validation::validate_inputs;
