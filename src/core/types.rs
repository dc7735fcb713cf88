use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TaxModel {
    /// Flat notional tax: `balance * tax_rate * capital_gains_tax` every year,
    /// whatever the account actually earned.
    #[serde(rename_all = "camelCase")]
    Notional {
        tax_rate: f64,
        tax_rate_volatility: Option<f64>,
        min_tax_rate: f64,
    },
    /// Capital gains tax charged only on what is realized.
    DeferredGains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    pub name: String,
    pub balance_withdrawal_rate: f64,
    pub profit_withdrawal_rate: f64,
    pub profit_lookback_years: u32,
    pub capital_gains_tax: f64,
    pub tax_model: TaxModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    pub weight: f64,
    pub return_mean: f64,
    pub return_volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub assets: Vec<Asset>,
    /// Row-major, `assets.len()` x `assets.len()`.
    pub correlation: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputParameters {
    pub initial_capital: f64,
    pub start_year: i32,
    pub years: u32,
    pub simulations: u32,
    pub return_mean: f64,
    pub return_volatility: f64,
    #[serde(default)]
    pub portfolio: Option<Portfolio>,
    pub inflation_mean: f64,
    pub inflation_volatility: f64,
    pub scenarios: Vec<ScenarioConfig>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioYearlyData {
    pub balance: f64,
    pub withdrawn: f64,
    pub tax: f64,
    pub cumulative_tax: f64,
    pub liquidation_value: f64,
    pub taxation_degree: f64,
    pub withdrawn_real: f64,
    pub cumulative_real_withdrawal: f64,
    pub accumulated_nominal_withdrawal: f64,
    pub effective_withdrawal_rate: f64,
    pub effective_tax_rate: f64,
    pub drawdown: f64,
    pub max_drawdown: f64,
    pub max_drawdown_period: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyRecord {
    pub year: u32,
    pub development: f64,
    pub inflation_rate: f64,
    pub cumulative_inflation: f64,
    pub scenarios: BTreeMap<String, ScenarioYearlyData>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    pub liquidation_value: f64,
    pub first_year_liquidation_value: f64,
    pub cumulative_tax: f64,
    pub taxation_degree: f64,
    pub real_withdrawal: f64,
    pub first_year_real_withdrawal: f64,
    pub cumulative_real_withdrawal: f64,
    pub accumulated_nominal_withdrawal: f64,
    pub average_effective_tax_rate: f64,
    pub max_drawdown: f64,
    pub max_drawdown_period: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub scenarios: BTreeMap<String, ScenarioSummary>,
    pub average_development: f64,
    pub average_inflation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    /// Position of this trajectory in the requested run, stable across
    /// worker scheduling and cancellation.
    pub id: usize,
    pub years: Vec<YearlyRecord>,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStatistics {
    pub count: usize,
    pub mean: Summary,
    pub stddev: Summary,
    pub p5: Summary,
    pub p25: Summary,
    pub median: Summary,
    pub p75: Summary,
    pub p95: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub trajectory_id: usize,
    pub year: i32,
    pub values: BTreeMap<String, f64>,
}

/// Numeric fields of [`ScenarioSummary`], enumerated so aggregation can walk
/// them without string lookups.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ScenarioMetric {
    LiquidationValue,
    FirstYearLiquidationValue,
    CumulativeTax,
    TaxationDegree,
    RealWithdrawal,
    FirstYearRealWithdrawal,
    CumulativeRealWithdrawal,
    AccumulatedNominalWithdrawal,
    AverageEffectiveTaxRate,
    MaxDrawdown,
    MaxDrawdownPeriod,
}

impl ScenarioMetric {
    pub const ALL: [ScenarioMetric; 11] = [
        ScenarioMetric::LiquidationValue,
        ScenarioMetric::FirstYearLiquidationValue,
        ScenarioMetric::CumulativeTax,
        ScenarioMetric::TaxationDegree,
        ScenarioMetric::RealWithdrawal,
        ScenarioMetric::FirstYearRealWithdrawal,
        ScenarioMetric::CumulativeRealWithdrawal,
        ScenarioMetric::AccumulatedNominalWithdrawal,
        ScenarioMetric::AverageEffectiveTaxRate,
        ScenarioMetric::MaxDrawdown,
        ScenarioMetric::MaxDrawdownPeriod,
    ];

    pub fn get(self, summary: &ScenarioSummary) -> f64 {
        match self {
            ScenarioMetric::LiquidationValue => summary.liquidation_value,
            ScenarioMetric::FirstYearLiquidationValue => summary.first_year_liquidation_value,
            ScenarioMetric::CumulativeTax => summary.cumulative_tax,
            ScenarioMetric::TaxationDegree => summary.taxation_degree,
            ScenarioMetric::RealWithdrawal => summary.real_withdrawal,
            ScenarioMetric::FirstYearRealWithdrawal => summary.first_year_real_withdrawal,
            ScenarioMetric::CumulativeRealWithdrawal => summary.cumulative_real_withdrawal,
            ScenarioMetric::AccumulatedNominalWithdrawal => summary.accumulated_nominal_withdrawal,
            ScenarioMetric::AverageEffectiveTaxRate => summary.average_effective_tax_rate,
            ScenarioMetric::MaxDrawdown => summary.max_drawdown,
            ScenarioMetric::MaxDrawdownPeriod => summary.max_drawdown_period,
        }
    }

    pub fn set(self, summary: &mut ScenarioSummary, value: f64) {
        let slot = match self {
            ScenarioMetric::LiquidationValue => &mut summary.liquidation_value,
            ScenarioMetric::FirstYearLiquidationValue => &mut summary.first_year_liquidation_value,
            ScenarioMetric::CumulativeTax => &mut summary.cumulative_tax,
            ScenarioMetric::TaxationDegree => &mut summary.taxation_degree,
            ScenarioMetric::RealWithdrawal => &mut summary.real_withdrawal,
            ScenarioMetric::FirstYearRealWithdrawal => &mut summary.first_year_real_withdrawal,
            ScenarioMetric::CumulativeRealWithdrawal => &mut summary.cumulative_real_withdrawal,
            ScenarioMetric::AccumulatedNominalWithdrawal => {
                &mut summary.accumulated_nominal_withdrawal
            }
            ScenarioMetric::AverageEffectiveTaxRate => &mut summary.average_effective_tax_rate,
            ScenarioMetric::MaxDrawdown => &mut summary.max_drawdown,
            ScenarioMetric::MaxDrawdownPeriod => &mut summary.max_drawdown_period,
        };
        *slot = value;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SharedMetric {
    AverageDevelopment,
    AverageInflation,
}

impl SharedMetric {
    pub const ALL: [SharedMetric; 2] = [
        SharedMetric::AverageDevelopment,
        SharedMetric::AverageInflation,
    ];

    pub fn get(self, summary: &Summary) -> f64 {
        match self {
            SharedMetric::AverageDevelopment => summary.average_development,
            SharedMetric::AverageInflation => summary.average_inflation,
        }
    }

    pub fn set(self, summary: &mut Summary, value: f64) {
        match self {
            SharedMetric::AverageDevelopment => summary.average_development = value,
            SharedMetric::AverageInflation => summary.average_inflation = value,
        }
    }
}

/// Per-year scenario value flattened by the time-series extractor.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum YearlyMetric {
    #[default]
    Balance,
    LiquidationValue,
    WithdrawnReal,
    CumulativeTax,
    TaxationDegree,
    Drawdown,
}

impl YearlyMetric {
    pub fn get(self, data: &ScenarioYearlyData) -> f64 {
        match self {
            YearlyMetric::Balance => data.balance,
            YearlyMetric::LiquidationValue => data.liquidation_value,
            YearlyMetric::WithdrawnReal => data.withdrawn_real,
            YearlyMetric::CumulativeTax => data.cumulative_tax,
            YearlyMetric::TaxationDegree => data.taxation_degree,
            YearlyMetric::Drawdown => data.drawdown,
        }
    }
}
