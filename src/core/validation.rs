use std::collections::HashSet;

use super::error::ConfigError;
use super::portfolio::CorrelatedReturns;
use super::types::{InputParameters, ScenarioConfig, TaxModel};

pub fn validate_inputs(inputs: &InputParameters) -> Result<(), ConfigError> {
    if inputs.years == 0 {
        return Err(ConfigError::ZeroHorizon);
    }
    if inputs.simulations == 0 {
        return Err(ConfigError::ZeroSimulations);
    }
    if !inputs.initial_capital.is_finite() {
        return Err(non_finite("initialCapital"));
    }
    if inputs.initial_capital <= 0.0 {
        return Err(ConfigError::NonPositiveCapital(inputs.initial_capital));
    }
    finite("returnMean", inputs.return_mean)?;
    non_negative("returnVolatility", inputs.return_volatility)?;
    finite("inflationMean", inputs.inflation_mean)?;
    non_negative("inflationVolatility", inputs.inflation_volatility)?;

    if let Some(portfolio) = &inputs.portfolio {
        CorrelatedReturns::new(portfolio)?;
    }

    if inputs.scenarios.is_empty() {
        return Err(ConfigError::NoScenarios);
    }
    let mut seen = HashSet::with_capacity(inputs.scenarios.len());
    for scenario in &inputs.scenarios {
        if scenario.name.trim().is_empty() {
            return Err(ConfigError::EmptyScenarioName);
        }
        if !seen.insert(scenario.name.as_str()) {
            return Err(ConfigError::DuplicateScenario(scenario.name.clone()));
        }
        validate_scenario(scenario)?;
    }
    Ok(())
}

fn validate_scenario(scenario: &ScenarioConfig) -> Result<(), ConfigError> {
    in_range("balanceWithdrawalRate", scenario.balance_withdrawal_rate, 0.0, 1.0)?;
    non_negative("profitWithdrawalRate", scenario.profit_withdrawal_rate)?;
    in_range("capitalGainsTax", scenario.capital_gains_tax, 0.0, 1.0)?;

    if let TaxModel::Notional {
        tax_rate,
        tax_rate_volatility,
        min_tax_rate,
    } = scenario.tax_model
    {
        in_range("minTaxRate", min_tax_rate, 0.0, 1.0)?;
        in_range("taxRate", tax_rate, min_tax_rate, 1.0)?;
        if let Some(vol) = tax_rate_volatility {
            non_negative("taxRateVolatility", vol)?;
        }
    }
    Ok(())
}

fn non_finite(field: &str) -> ConfigError {
    ConfigError::NonFinite {
        field: field.to_string(),
    }
}

fn finite(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(non_finite(field))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    in_range(field, value, 0.0, f64::MAX)
}

fn in_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Asset, Portfolio};

    fn sample_inputs() -> InputParameters {
        InputParameters {
            initial_capital: 1_000_000.0,
            start_year: 2025,
            years: 20,
            simulations: 100,
            return_mean: 0.07,
            return_volatility: 0.15,
            portfolio: None,
            inflation_mean: 0.02,
            inflation_volatility: 0.01,
            scenarios: vec![
                ScenarioConfig {
                    name: "A".to_string(),
                    balance_withdrawal_rate: 0.03,
                    profit_withdrawal_rate: 0.0,
                    profit_lookback_years: 0,
                    capital_gains_tax: 0.30,
                    tax_model: TaxModel::Notional {
                        tax_rate: 0.03,
                        tax_rate_volatility: Some(0.002),
                        min_tax_rate: 0.0125,
                    },
                },
                ScenarioConfig {
                    name: "B".to_string(),
                    balance_withdrawal_rate: 0.03,
                    profit_withdrawal_rate: 0.0,
                    profit_lookback_years: 0,
                    capital_gains_tax: 0.30,
                    tax_model: TaxModel::DeferredGains,
                },
            ],
            seed: Some(1),
        }
    }

    #[test]
    fn accepts_sample_inputs() {
        assert_eq!(validate_inputs(&sample_inputs()), Ok(()));
    }

    #[test]
    fn rejects_zero_horizon_and_zero_simulations() {
        let mut inputs = sample_inputs();
        inputs.years = 0;
        assert_eq!(validate_inputs(&inputs), Err(ConfigError::ZeroHorizon));

        let mut inputs = sample_inputs();
        inputs.simulations = 0;
        assert_eq!(validate_inputs(&inputs), Err(ConfigError::ZeroSimulations));
    }

    #[test]
    fn rejects_missing_and_duplicate_scenarios() {
        let mut inputs = sample_inputs();
        inputs.scenarios.clear();
        assert_eq!(validate_inputs(&inputs), Err(ConfigError::NoScenarios));

        let mut inputs = sample_inputs();
        inputs.scenarios[1].name = "A".to_string();
        assert_eq!(
            validate_inputs(&inputs),
            Err(ConfigError::DuplicateScenario("A".to_string()))
        );
    }

    #[test]
    fn rejects_tax_rate_below_floor() {
        let mut inputs = sample_inputs();
        inputs.scenarios[0].tax_model = TaxModel::Notional {
            tax_rate: 0.01,
            tax_rate_volatility: None,
            min_tax_rate: 0.0125,
        };
        let err = validate_inputs(&inputs).expect_err("tax rate below floor");
        assert!(err.to_string().contains("taxRate"));
    }

    #[test]
    fn rejects_non_finite_return() {
        let mut inputs = sample_inputs();
        inputs.return_mean = f64::NAN;
        assert_eq!(
            validate_inputs(&inputs),
            Err(ConfigError::NonFinite {
                field: "returnMean".to_string()
            })
        );
    }

    #[test]
    fn rejects_malformed_portfolio() {
        let mut inputs = sample_inputs();
        inputs.portfolio = Some(Portfolio {
            assets: vec![Asset {
                name: "equity".to_string(),
                weight: 1.0,
                return_mean: 0.07,
                return_volatility: 0.15,
            }],
            correlation: vec![vec![1.0, 0.0]],
        });
        assert_eq!(
            validate_inputs(&inputs),
            Err(ConfigError::CorrelationShape { expected: 1 })
        );
    }
}
