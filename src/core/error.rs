use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("years must be > 0")]
    ZeroHorizon,
    #[error("simulations must be > 0")]
    ZeroSimulations,
    #[error("at least one scenario is required")]
    NoScenarios,
    #[error("scenario names must be non-empty")]
    EmptyScenarioName,
    #[error("duplicate scenario name `{0}`")]
    DuplicateScenario(String),
    #[error("initial capital must be > 0, got {0}")]
    NonPositiveCapital(f64),
    #[error("{field} must be finite")]
    NonFinite { field: String },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("portfolio must contain at least one asset")]
    EmptyPortfolio,
    #[error("portfolio weights must sum to a positive value")]
    ZeroPortfolioWeight,
    #[error("correlation matrix must be {expected}x{expected}")]
    CorrelationShape { expected: usize },
    #[error("correlation matrix must be symmetric with a unit diagonal")]
    CorrelationNotSymmetric,
    #[error("correlation matrix must be positive definite")]
    CorrelationNotPositiveDefinite,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
