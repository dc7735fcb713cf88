use super::error::ConfigError;
use super::sampler::GaussianSource;
use super::types::Portfolio;

const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Weighted portfolio return built from correlated per-asset normal draws.
///
/// Draws one independent standard normal per asset, correlates them with the
/// lower Cholesky factor `L` of the correlation matrix (`z' = L z`), turns each
/// into `mean + vol * z'` and returns the weight-averaged return.
#[derive(Debug, Clone)]
pub struct CorrelatedReturns {
    weights: Vec<f64>,
    means: Vec<f64>,
    vols: Vec<f64>,
    cholesky: Vec<Vec<f64>>,
}

impl CorrelatedReturns {
    pub fn new(portfolio: &Portfolio) -> Result<Self, ConfigError> {
        let n = portfolio.assets.len();
        if n == 0 {
            return Err(ConfigError::EmptyPortfolio);
        }

        for asset in &portfolio.assets {
            for (field, value) in [
                ("weight", asset.weight),
                ("returnMean", asset.return_mean),
                ("returnVolatility", asset.return_volatility),
            ] {
                if !value.is_finite() {
                    return Err(ConfigError::NonFinite {
                        field: format!("portfolio.{}.{field}", asset.name),
                    });
                }
            }
            if asset.weight < 0.0 || asset.return_volatility < 0.0 {
                return Err(ConfigError::OutOfRange {
                    field: format!("portfolio.{}", asset.name),
                    value: asset.weight.min(asset.return_volatility),
                    min: 0.0,
                    max: f64::MAX,
                });
            }
        }

        let total_weight: f64 = portfolio.assets.iter().map(|a| a.weight).sum();
        if total_weight <= 0.0 {
            return Err(ConfigError::ZeroPortfolioWeight);
        }

        if portfolio.correlation.len() != n || portfolio.correlation.iter().any(|r| r.len() != n)
        {
            return Err(ConfigError::CorrelationShape { expected: n });
        }
        let corr = &portfolio.correlation;
        if corr.iter().flatten().any(|x| !x.is_finite()) {
            return Err(ConfigError::NonFinite {
                field: "portfolio.correlation".to_string(),
            });
        }
        for i in 0..n {
            if (corr[i][i] - 1.0).abs() > SYMMETRY_TOLERANCE {
                return Err(ConfigError::CorrelationNotSymmetric);
            }
            for j in 0..i {
                if (corr[i][j] - corr[j][i]).abs() > SYMMETRY_TOLERANCE {
                    return Err(ConfigError::CorrelationNotSymmetric);
                }
            }
        }

        Ok(Self {
            weights: portfolio
                .assets
                .iter()
                .map(|a| a.weight / total_weight)
                .collect(),
            means: portfolio.assets.iter().map(|a| a.return_mean).collect(),
            vols: portfolio.assets.iter().map(|a| a.return_volatility).collect(),
            cholesky: cholesky(corr)?,
        })
    }

    pub fn sample(&self, sampler: &mut impl GaussianSource) -> f64 {
        let z: Vec<f64> = (0..self.weights.len())
            .map(|_| sampler.standard_normal())
            .collect();

        self.cholesky
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let correlated: f64 = row.iter().zip(&z).take(i + 1).map(|(l, z)| l * z).sum();
                self.weights[i] * (self.means[i] + self.vols[i] * correlated)
            })
            .sum()
    }
}

fn cholesky(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ConfigError> {
    let n = matrix.len();
    let mut lower = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let dot: f64 = (0..j).map(|k| lower[i][k] * lower[j][k]).sum();
            if i == j {
                let diag = matrix[i][i] - dot;
                if diag <= 0.0 {
                    return Err(ConfigError::CorrelationNotPositiveDefinite);
                }
                lower[i][j] = diag.sqrt();
            } else {
                lower[i][j] = (matrix[i][j] - dot) / lower[j][j];
            }
        }
    }
    Ok(lower)
}
