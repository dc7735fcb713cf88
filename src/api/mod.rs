use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{
    InputParameters, Portfolio, RunOptions, ScenarioConfig, SimulationRun, SimulationStatistics,
    TaxModel, TimeSeriesPoint, Trajectory, YearlyMetric, run_simulations, select_representative,
    validate_inputs,
};

#[derive(Parser, Debug)]
#[command(
    name = "tax-regime-sim",
    about = "Monte Carlo comparison of a notional-tax account and a deferred-gains account"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one simulation and print statistics as JSON
    Run(RunArgs),
    /// Serve the simulation over HTTP
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

/// Percent-denominated knobs for the standard A (notional) vs B (deferred)
/// comparison.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, default_value_t = 1_000_000.0)]
    initial_capital: f64,
    #[arg(long, default_value_t = 2025)]
    start_year: i32,
    #[arg(long, default_value_t = 30)]
    years: u32,
    #[arg(long, default_value_t = 10_000)]
    simulations: u32,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 7.0, help = "Expected annual return in percent")]
    return_mean: f64,
    #[arg(long, default_value_t = 15.0, help = "Annual return volatility in percent")]
    return_volatility: f64,
    #[arg(long, default_value_t = 2.0, help = "Expected annual inflation in percent")]
    inflation_mean: f64,
    #[arg(long, default_value_t = 1.0, help = "Annual inflation volatility in percent")]
    inflation_volatility: f64,
    #[arg(long, default_value_t = 30.0, help = "Capital gains tax in percent")]
    capital_gains_tax: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Notional yield the notional account is taxed on, in percent"
    )]
    notional_tax_rate: f64,
    #[arg(long, help = "Annual random-walk volatility of the notional yield, in percent")]
    notional_tax_volatility: Option<f64>,
    #[arg(long, default_value_t = 1.25, help = "Floor for the notional yield, in percent")]
    notional_min_tax_rate: f64,
    #[arg(long, default_value_t = 3.0, help = "Yearly withdrawal as percent of balance")]
    balance_withdrawal_rate: f64,
    #[arg(long, default_value_t = 0.0, help = "Share of average profit withdrawn, in percent")]
    profit_withdrawal_rate: f64,
    #[arg(long, default_value_t = 0)]
    profit_lookback_years: u32,
    #[arg(long, help = "Worker threads; defaults to one per core")]
    workers: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    initial_capital: Option<f64>,
    start_year: Option<i32>,
    years: Option<u32>,
    simulations: Option<u32>,
    seed: Option<u64>,

    return_mean: Option<f64>,
    return_volatility: Option<f64>,
    inflation_mean: Option<f64>,
    inflation_volatility: Option<f64>,

    capital_gains_tax: Option<f64>,
    notional_tax_rate: Option<f64>,
    notional_tax_volatility: Option<f64>,
    notional_min_tax_rate: Option<f64>,
    balance_withdrawal_rate: Option<f64>,
    profit_withdrawal_rate: Option<f64>,
    profit_lookback_years: Option<u32>,

    /// Full scenario list in fractions; replaces the standard A/B pair.
    scenarios: Option<Vec<ScenarioConfig>>,
    portfolio: Option<Portfolio>,

    include_time_series: Option<bool>,
    time_series_metric: Option<YearlyMetric>,
}

#[derive(Copy, Clone, Debug)]
struct ApiOptions {
    include_time_series: bool,
    time_series_metric: YearlyMetric,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: InputParameters,
    options: ApiOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    requested: usize,
    completed: usize,
    cancelled: bool,
    statistics: SimulationStatistics,
    representative_index: Option<usize>,
    representative: Option<Trajectory>,
    time_series: Option<Vec<TimeSeriesPoint>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

const MAX_YEARS: u32 = 100;
const MAX_SIMULATIONS: u32 = 100_000;
/// Upper bound on `years * simulations`; every simulated year is kept in memory.
const MAX_SIMULATED_YEARS: u64 = 5_000_000;

pub fn build_inputs(args: &RunArgs) -> Result<InputParameters, String> {
    if args.years > MAX_YEARS {
        return Err(format!("years must be <= {MAX_YEARS}, got {}", args.years));
    }
    if args.simulations > MAX_SIMULATIONS {
        return Err(format!(
            "simulations must be <= {MAX_SIMULATIONS}, got {}",
            args.simulations
        ));
    }
    if u64::from(args.years) * u64::from(args.simulations) > MAX_SIMULATED_YEARS {
        return Err(format!(
            "years * simulations must be <= {MAX_SIMULATED_YEARS}, got {} x {}",
            args.years, args.simulations
        ));
    }

    let capital_gains_tax = args.capital_gains_tax / 100.0;
    let balance_withdrawal_rate = args.balance_withdrawal_rate / 100.0;
    let profit_withdrawal_rate = args.profit_withdrawal_rate / 100.0;

    let notional = ScenarioConfig {
        name: "A".to_string(),
        balance_withdrawal_rate,
        profit_withdrawal_rate,
        profit_lookback_years: args.profit_lookback_years,
        capital_gains_tax,
        tax_model: TaxModel::Notional {
            tax_rate: args.notional_tax_rate / 100.0,
            tax_rate_volatility: args.notional_tax_volatility.map(|v| v / 100.0),
            min_tax_rate: args.notional_min_tax_rate / 100.0,
        },
    };
    let deferred = ScenarioConfig {
        name: "B".to_string(),
        tax_model: TaxModel::DeferredGains,
        ..notional.clone()
    };

    let inputs = InputParameters {
        initial_capital: args.initial_capital,
        start_year: args.start_year,
        years: args.years,
        simulations: args.simulations,
        return_mean: args.return_mean / 100.0,
        return_volatility: args.return_volatility / 100.0,
        portfolio: None,
        inflation_mean: args.inflation_mean / 100.0,
        inflation_volatility: args.inflation_volatility / 100.0,
        scenarios: vec![notional, deferred],
        seed: args.seed,
    };
    validate_inputs(&inputs).map_err(|e| e.to_string())?;
    Ok(inputs)
}

pub fn run_cli(args: &RunArgs) -> Result<String, String> {
    let inputs = build_inputs(args)?;
    let options = RunOptions {
        workers: args.workers,
        ..RunOptions::default()
    };
    let run = run_simulations(&inputs, &options, None, None).map_err(|e| e.to_string())?;
    let response = build_simulate_response(
        &inputs,
        run,
        ApiOptions {
            include_time_series: false,
            time_series_metric: YearlyMetric::default(),
        },
    )?;
    serde_json::to_string_pretty(&response).map_err(|e| format!("failed to encode output: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "simulation HTTP API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> impl IntoResponse {
    with_cache_control("ok")
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let run = run_simulations(&request.inputs, &RunOptions::default(), None, None)
            .map_err(|e| e.to_string())?;
        build_simulate_response(&request.inputs, run, request.options)
    })
    .await;

    match outcome {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(msg)) => error_response(StatusCode::BAD_REQUEST, &msg),
        Err(join_error) => {
            error!(%join_error, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation failed")
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut args = default_args_for_api();
    let options = ApiOptions {
        include_time_series: payload.include_time_series.unwrap_or(false),
        time_series_metric: payload.time_series_metric.unwrap_or_default(),
    };

    if let Some(v) = payload.initial_capital {
        args.initial_capital = v;
    }
    if let Some(v) = payload.start_year {
        args.start_year = v;
    }
    if let Some(v) = payload.years {
        args.years = v;
    }
    if let Some(v) = payload.simulations {
        args.simulations = v;
    }
    if let Some(v) = payload.seed {
        args.seed = Some(v);
    }
    if let Some(v) = payload.return_mean {
        args.return_mean = v;
    }
    if let Some(v) = payload.return_volatility {
        args.return_volatility = v;
    }
    if let Some(v) = payload.inflation_mean {
        args.inflation_mean = v;
    }
    if let Some(v) = payload.inflation_volatility {
        args.inflation_volatility = v;
    }
    if let Some(v) = payload.capital_gains_tax {
        args.capital_gains_tax = v;
    }
    if let Some(v) = payload.notional_tax_rate {
        args.notional_tax_rate = v;
    }
    if let Some(v) = payload.notional_tax_volatility {
        args.notional_tax_volatility = Some(v);
    }
    if let Some(v) = payload.notional_min_tax_rate {
        args.notional_min_tax_rate = v;
    }
    if let Some(v) = payload.balance_withdrawal_rate {
        args.balance_withdrawal_rate = v;
    }
    if let Some(v) = payload.profit_withdrawal_rate {
        args.profit_withdrawal_rate = v;
    }
    if let Some(v) = payload.profit_lookback_years {
        args.profit_lookback_years = v;
    }

    let mut inputs = build_inputs(&args)?;
    if payload.scenarios.is_some() || payload.portfolio.is_some() {
        if let Some(scenarios) = payload.scenarios {
            inputs.scenarios = scenarios;
        }
        inputs.portfolio = payload.portfolio;
        validate_inputs(&inputs).map_err(|e| e.to_string())?;
    }

    Ok(ApiRequest { inputs, options })
}

fn default_args_for_api() -> RunArgs {
    RunArgs {
        initial_capital: 1_000_000.0,
        start_year: 2025,
        years: 30,
        simulations: 2_000,
        seed: None,
        return_mean: 7.0,
        return_volatility: 15.0,
        inflation_mean: 2.0,
        inflation_volatility: 1.0,
        capital_gains_tax: 30.0,
        notional_tax_rate: 3.0,
        notional_tax_volatility: None,
        notional_min_tax_rate: 1.25,
        balance_withdrawal_rate: 3.0,
        profit_withdrawal_rate: 0.0,
        profit_lookback_years: 0,
        workers: None,
    }
}

fn build_simulate_response(
    inputs: &InputParameters,
    run: SimulationRun,
    options: ApiOptions,
) -> Result<SimulateResponse, String> {
    let statistics = run
        .statistics()
        .ok_or_else(|| "Simulation produced no trajectories".to_string())?;
    let representative_index = select_representative(&run.trajectories, &statistics);
    let time_series = options
        .include_time_series
        .then(|| run.time_series(options.time_series_metric, inputs.start_year));

    let completed = run.trajectories.len();
    let representative = representative_index.map(|idx| run.trajectories[idx].clone());

    Ok(SimulateResponse {
        requested: run.requested,
        completed,
        cancelled: run.cancelled,
        statistics,
        representative_index,
        representative,
        time_series,
    })
}
