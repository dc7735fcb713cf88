use std::collections::BTreeMap;

use super::error::ConfigError;
use super::portfolio::CorrelatedReturns;
use super::sampler::{BoxMuller, GaussianSource};
use super::scenario::{ScenarioState, YearContext};
use super::types::{
    InputParameters, ScenarioSummary, ScenarioYearlyData, Summary, Trajectory, YearlyRecord,
};
use super::validation::validate_inputs;

const MIN_DEVELOPMENT: f64 = -1.0;
const MIN_INFLATION: f64 = -0.99;

/// Runs one validated trajectory from a single seed.
pub fn run_trajectory(
    inputs: &InputParameters,
    id: usize,
    seed: u64,
) -> Result<Trajectory, ConfigError> {
    validate_inputs(inputs)?;
    let returns = inputs
        .portfolio
        .as_ref()
        .map(CorrelatedReturns::new)
        .transpose()?;
    Ok(simulate_trajectory(inputs, returns.as_ref(), id, seed))
}

/// Macro draws come from the trajectory seed; each scenario's tax-rate walk
/// gets its own derived stream so one scenario's settings never shift the
/// draws another scenario sees.
pub(crate) fn simulate_trajectory(
    inputs: &InputParameters,
    returns: Option<&CorrelatedReturns>,
    id: usize,
    seed: u64,
) -> Trajectory {
    let mut market = BoxMuller::seeded(seed);
    let mut walks: Vec<_> = (0..inputs.scenarios.len())
        .map(|idx| BoxMuller::seeded(derive_seed(seed, idx as u32)))
        .collect();
    simulate_with_sources(inputs, returns, id, &mut market, &mut walks)
}

pub(crate) fn simulate_with_sources<M: GaussianSource, W: GaussianSource>(
    inputs: &InputParameters,
    returns: Option<&CorrelatedReturns>,
    id: usize,
    market: &mut M,
    walks: &mut [W],
) -> Trajectory {
    let mut states: Vec<ScenarioState> = inputs
        .scenarios
        .iter()
        .map(|config| ScenarioState::new(config, inputs.initial_capital, inputs.years))
        .collect();

    let mut records = Vec::with_capacity(inputs.years as usize);
    let mut cumulative_inflation = 1.0;

    for year in 0..inputs.years {
        let development = match returns {
            Some(returns) => returns.sample(market),
            None => market.sample(inputs.return_mean, inputs.return_volatility),
        }
        .max(MIN_DEVELOPMENT);
        let inflation_rate = market
            .sample(inputs.inflation_mean, inputs.inflation_volatility)
            .max(MIN_INFLATION);
        cumulative_inflation *= 1.0 + inflation_rate;

        let context = YearContext {
            development,
            inflation_rate,
            cumulative_inflation,
            first_year: year == 0,
            initial_capital: inputs.initial_capital,
        };

        let mut scenarios = BTreeMap::new();
        for ((config, state), walk) in inputs.scenarios.iter().zip(&mut states).zip(walks.iter_mut())
        {
            scenarios.insert(config.name.clone(), state.evolve(config, &context, walk));
        }

        records.push(YearlyRecord {
            year,
            development,
            inflation_rate,
            cumulative_inflation,
            scenarios,
        });
    }

    let summary = summarize(inputs, &records);
    Trajectory {
        id,
        years: records,
        summary,
    }
}

fn summarize(inputs: &InputParameters, records: &[YearlyRecord]) -> Summary {
    let year_count = records.len().max(1) as f64;
    let scenarios = inputs
        .scenarios
        .iter()
        .map(|config| {
            let yearly: Vec<&ScenarioYearlyData> = records
                .iter()
                .filter_map(|r| r.scenarios.get(&config.name))
                .collect();
            (
                config.name.clone(),
                summarize_scenario(inputs.initial_capital, &yearly),
            )
        })
        .collect();

    Summary {
        scenarios,
        average_development: records.iter().map(|r| r.development).sum::<f64>() / year_count,
        average_inflation: records.iter().map(|r| r.inflation_rate).sum::<f64>() / year_count,
    }
}

fn summarize_scenario(initial_capital: f64, yearly: &[&ScenarioYearlyData]) -> ScenarioSummary {
    let (Some(first), Some(last)) = (yearly.first(), yearly.last()) else {
        return ScenarioSummary {
            liquidation_value: initial_capital,
            first_year_liquidation_value: initial_capital,
            ..ScenarioSummary::default()
        };
    };

    ScenarioSummary {
        liquidation_value: last.liquidation_value,
        first_year_liquidation_value: initial_capital,
        cumulative_tax: last.cumulative_tax,
        taxation_degree: last.taxation_degree,
        real_withdrawal: last.withdrawn_real,
        first_year_real_withdrawal: first.withdrawn_real,
        cumulative_real_withdrawal: last.cumulative_real_withdrawal,
        accumulated_nominal_withdrawal: last.accumulated_nominal_withdrawal,
        average_effective_tax_rate: yearly.iter().map(|d| d.effective_tax_rate).sum::<f64>()
            / yearly.len() as f64,
        max_drawdown: last.max_drawdown,
        max_drawdown_period: last.max_drawdown_period as f64,
    }
}

pub(crate) fn derive_seed(base_seed: u64, stream: u32) -> u64 {
    let mixed = base_seed ^ ((stream as u64 + 1) << 32);
    splitmix64(mixed)
}

pub(crate) fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::core::types::{InputParameters, ScenarioConfig, TaxModel};

    pub fn notional_scenario(name: &str) -> ScenarioConfig {
        ScenarioConfig {
            name: name.to_string(),
            balance_withdrawal_rate: 0.0,
            profit_withdrawal_rate: 0.0,
            profit_lookback_years: 0,
            capital_gains_tax: 0.30,
            tax_model: TaxModel::Notional {
                tax_rate: 0.03,
                tax_rate_volatility: None,
                min_tax_rate: 0.0125,
            },
        }
    }

    pub fn deferred_scenario(name: &str) -> ScenarioConfig {
        ScenarioConfig {
            name: name.to_string(),
            balance_withdrawal_rate: 0.0,
            profit_withdrawal_rate: 0.0,
            profit_lookback_years: 0,
            capital_gains_tax: 0.30,
            tax_model: TaxModel::DeferredGains,
        }
    }

    /// One year, development fixed at 10%, no inflation.
    pub fn deterministic_inputs() -> InputParameters {
        InputParameters {
            initial_capital: 1_000_000.0,
            start_year: 2025,
            years: 1,
            simulations: 1,
            return_mean: 0.10,
            return_volatility: 0.0,
            portfolio: None,
            inflation_mean: 0.0,
            inflation_volatility: 0.0,
            scenarios: vec![notional_scenario("A"), deferred_scenario("B")],
            seed: Some(7),
        }
    }

    pub fn stochastic_inputs() -> InputParameters {
        let mut a = notional_scenario("A");
        a.balance_withdrawal_rate = 0.03;
        a.profit_withdrawal_rate = 0.2;
        a.profit_lookback_years = 3;
        a.tax_model = TaxModel::Notional {
            tax_rate: 0.03,
            tax_rate_volatility: Some(0.004),
            min_tax_rate: 0.0125,
        };
        let mut b = deferred_scenario("B");
        b.balance_withdrawal_rate = 0.03;
        b.profit_withdrawal_rate = 0.2;
        b.profit_lookback_years = 3;

        InputParameters {
            initial_capital: 1_000_000.0,
            start_year: 2025,
            years: 25,
            simulations: 250,
            return_mean: 0.07,
            return_volatility: 0.16,
            portfolio: None,
            inflation_mean: 0.02,
            inflation_volatility: 0.01,
            scenarios: vec![a, b],
            seed: Some(42),
        }
    }
}
