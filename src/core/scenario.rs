use super::sampler::GaussianSource;
use super::types::{ScenarioConfig, ScenarioYearlyData, TaxModel};

/// Macro conditions for one simulated year, shared by every scenario of a
/// trajectory.
#[derive(Debug, Clone, Copy)]
pub struct YearContext {
    pub development: f64,
    pub inflation_rate: f64,
    pub cumulative_inflation: f64,
    pub first_year: bool,
    pub initial_capital: f64,
}

/// Mutable per-scenario state, owned by one trajectory and dropped with it.
#[derive(Debug, Clone)]
pub struct ScenarioState {
    balance: f64,
    cumulative_tax: f64,
    cumulative_real_withdrawal: f64,
    accumulated_nominal_withdrawal: f64,
    tax_rate: f64,
    /// Opening balance of year 0 followed by every year-end balance.
    balance_history: Vec<f64>,
    peak_balance: f64,
    years_below_peak: u32,
    max_drawdown: f64,
    max_drawdown_period: u32,
}

impl ScenarioState {
    pub fn new(config: &ScenarioConfig, initial_capital: f64, years: u32) -> Self {
        let tax_rate = match config.tax_model {
            TaxModel::Notional { tax_rate, .. } => tax_rate,
            TaxModel::DeferredGains => 0.0,
        };
        let mut balance_history = Vec::with_capacity(years as usize + 1);
        balance_history.push(initial_capital);

        Self {
            balance: initial_capital,
            cumulative_tax: 0.0,
            cumulative_real_withdrawal: 0.0,
            accumulated_nominal_withdrawal: 0.0,
            tax_rate,
            balance_history,
            peak_balance: initial_capital,
            years_below_peak: 0,
            max_drawdown: 0.0,
            max_drawdown_period: 0,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn tax_rate(&self) -> f64 {
        self.tax_rate
    }

    /// Advances the scenario by one year and returns that year's record.
    ///
    /// Withdrawals and the notional tax are assessed on the opening balance;
    /// liquidation value, taxation degree and drawdown on the closing balance.
    pub fn evolve(
        &mut self,
        config: &ScenarioConfig,
        year: &YearContext,
        tax_walk: &mut impl GaussianSource,
    ) -> ScenarioYearlyData {
        if let TaxModel::Notional {
            tax_rate_volatility: Some(vol),
            min_tax_rate,
            ..
        } = config.tax_model
        {
            let delta = tax_walk.sample(0.0, vol);
            self.tax_rate = clamp_tax_rate(self.tax_rate + delta, min_tax_rate);
        }

        let opening = self.balance;
        let balance_withdrawal = opening * config.balance_withdrawal_rate;
        let profit_withdrawal = self.profit_withdrawal(config, year.first_year);
        let withdrawn = balance_withdrawal + profit_withdrawal;
        let effective_withdrawal_rate = ratio(withdrawn, opening);

        let grown = opening * (1.0 + year.development);
        let (tax, closing) = match config.tax_model {
            TaxModel::Notional { .. } => {
                let tax = opening * self.tax_rate * config.capital_gains_tax;
                (tax, (grown - withdrawn - tax).max(0.0))
            }
            TaxModel::DeferredGains => {
                let tax = withdrawn * config.capital_gains_tax;
                (tax, (grown - withdrawn).max(0.0))
            }
        };
        let liquidation_value = match config.tax_model {
            TaxModel::Notional { .. } => closing,
            TaxModel::DeferredGains => {
                let unrealized_gain = closing - year.initial_capital;
                closing - unrealized_gain.max(0.0) * config.capital_gains_tax
            }
        };

        self.cumulative_tax += tax;
        let taxation_degree = if liquidation_value > 0.0 {
            self.cumulative_tax / liquidation_value
        } else {
            0.0
        };

        let withdrawn_real = ratio(withdrawn, year.cumulative_inflation);
        self.cumulative_real_withdrawal += withdrawn_real;
        self.accumulated_nominal_withdrawal += withdrawn;

        self.balance = closing;
        self.balance_history.push(closing);
        let drawdown = self.track_drawdown(closing);

        ScenarioYearlyData {
            balance: closing,
            withdrawn,
            tax,
            cumulative_tax: self.cumulative_tax,
            liquidation_value,
            taxation_degree,
            withdrawn_real,
            cumulative_real_withdrawal: self.cumulative_real_withdrawal,
            accumulated_nominal_withdrawal: self.accumulated_nominal_withdrawal,
            effective_withdrawal_rate,
            effective_tax_rate: ratio(tax, opening),
            drawdown,
            max_drawdown: self.max_drawdown,
            max_drawdown_period: self.max_drawdown_period,
        }
    }

    /// Average yearly profit over the lookback window times the profit rate.
    /// Zero in the first year, when the window is longer than the recorded
    /// history, and whenever the window lost money.
    fn profit_withdrawal(&self, config: &ScenarioConfig, first_year: bool) -> f64 {
        let history_years = self.balance_history.len().saturating_sub(1);
        let configured = config.profit_lookback_years as usize;
        if first_year || configured == 0 || configured > history_years {
            return 0.0;
        }

        let lookback = configured.min(history_years);
        let start = self.balance_history[self.balance_history.len() - 1 - lookback];
        let average_profit = (self.balance - start) / lookback as f64;
        (average_profit * config.profit_withdrawal_rate).max(0.0)
    }

    fn track_drawdown(&mut self, closing: f64) -> f64 {
        if closing >= self.peak_balance {
            self.peak_balance = closing;
            self.years_below_peak = 0;
        } else {
            self.years_below_peak += 1;
        }

        let drawdown = if self.peak_balance > 0.0 {
            1.0 - closing / self.peak_balance
        } else {
            0.0
        };
        self.max_drawdown = self.max_drawdown.max(drawdown);
        self.max_drawdown_period = self.max_drawdown_period.max(self.years_below_peak);
        drawdown
    }
}

fn clamp_tax_rate(rate: f64, min_tax_rate: f64) -> f64 {
    if rate.is_nan() {
        return min_tax_rate;
    }
    rate.max(min_tax_rate).min(1.0)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
