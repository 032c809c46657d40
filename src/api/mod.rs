use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    Router,
    extract::Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{
    CalculationMode, DeterministicResult, MonteCarloResult, ReverseCalculationResult,
    ScenarioError, ScenarioParams, SimulationRow, TaxEngine, TaxableIncome, run_monte_carlo,
    simulate, solve_starting_wealth,
};

#[derive(Parser, Debug)]
#[command(
    name = "wealthpath",
    about = "Multi-decade wealth projection with holding-company tax, private commitments and Monte Carlo"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run a scenario file and print the result as JSON.
    Run(RunArgs),
    /// Print the default scenario as JSON.
    Defaults,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliMode {
    Forward,
    Reverse,
    MonteCarlo,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long, help = "Scenario JSON file; missing fields take default values")]
    pub scenario: PathBuf,
    #[arg(
        long,
        value_enum,
        help = "Overrides calculationMode/runMonteCarlo from the scenario"
    )]
    pub mode: Option<CliMode>,
    #[arg(long, help = "Monte Carlo path count (100-2000)")]
    pub paths: Option<u32>,
    #[arg(long, help = "Monte Carlo base seed")]
    pub seed: Option<u64>,
}

/// Lifetime tax split by component, summed over the projected rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSummary {
    pub income_tax: f64,
    pub trade_tax: f64,
    pub withholding_tax: f64,
    pub total: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    pub mode: CalculationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deterministic: Option<DeterministicResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse: Option<ReverseCalculationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<MonteCarloResult>,
    pub tax_summary: TaxSummary,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

fn tax_summary(params: &ScenarioParams, rows: &[SimulationRow]) -> TaxSummary {
    let engine = TaxEngine::new(params);
    rows.iter().fold(TaxSummary::default(), |acc, row| {
        let breakdown = engine.full_breakdown(&TaxableIncome {
            dividend_income: row.dividend_income,
            interest_income: row.interest_income,
            public_realized_gains: row.public_realized_gains,
            private_realized_gains: row.private_realized_gains,
        });
        TaxSummary {
            income_tax: acc.income_tax + breakdown.income_tax,
            trade_tax: acc.trade_tax + breakdown.trade_tax,
            withholding_tax: acc.withholding_tax + breakdown.withholding_tax,
            total: acc.total + breakdown.total(),
        }
    })
}

/// Runs whatever the scenario asks for: a forward projection or the reverse
/// solver, plus Monte Carlo when `run_monte_carlo` is set. In reverse mode the
/// Monte Carlo runs start from the solved starting wealth.
pub fn simulate_response(params: &ScenarioParams) -> Result<SimulateResponse, ScenarioError> {
    let mut projected = params.clone();
    let (deterministic, reverse, summary) = match params.calculation_mode {
        CalculationMode::Forward => {
            let result = simulate(params)?;
            let summary = tax_summary(params, &result.rows);
            (Some(result), None, summary)
        }
        CalculationMode::Reverse => {
            let result = solve_starting_wealth(params)?;
            projected.start_wealth = result.required_starting_wealth;
            let summary = tax_summary(&projected, &result.rows);
            (None, Some(result), summary)
        }
    };

    let monte_carlo = if params.run_monte_carlo {
        Some(run_monte_carlo(&projected)?)
    } else {
        None
    };

    Ok(SimulateResponse {
        mode: params.calculation_mode,
        deterministic,
        reverse,
        monte_carlo,
        tax_summary: summary,
    })
}

fn apply_run_overrides(params: &mut ScenarioParams, args: &RunArgs) {
    match args.mode {
        Some(CliMode::Forward) => {
            params.calculation_mode = CalculationMode::Forward;
            params.run_monte_carlo = false;
        }
        Some(CliMode::Reverse) => {
            params.calculation_mode = CalculationMode::Reverse;
            params.run_monte_carlo = false;
        }
        Some(CliMode::MonteCarlo) => {
            params.calculation_mode = CalculationMode::Forward;
            params.run_monte_carlo = true;
        }
        None => {}
    }
    if let Some(paths) = args.paths {
        params.num_paths = paths;
    }
    if let Some(seed) = args.seed {
        params.seed = seed;
    }
}

pub fn run_scenario_file(args: &RunArgs) -> Result<String, ScenarioError> {
    let raw = std::fs::read_to_string(&args.scenario)?;
    let mut params = ScenarioParams::from_json(&raw)?;
    apply_run_overrides(&mut params, args);
    info!(
        scenario = %args.scenario.display(),
        mode = ?params.calculation_mode,
        monte_carlo = params.run_monte_carlo,
        "running scenario"
    );
    let response = simulate_response(&params)?;
    Ok(serde_json::to_string_pretty(&response)?)
}

pub fn default_scenario_json() -> Result<String, ScenarioError> {
    ScenarioParams::default().to_json()
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/scenario/default", get(default_scenario_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/monte-carlo", post(monte_carlo_handler))
        .route("/api/reverse", post(reverse_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("wealthpath HTTP API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn default_scenario_handler() -> Response {
    json_response(StatusCode::OK, ScenarioParams::default())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", None)
}

async fn simulate_handler(body: String) -> Response {
    run_engine(body, simulate_response).await
}

async fn monte_carlo_handler(body: String) -> Response {
    run_engine(body, run_monte_carlo).await
}

async fn reverse_handler(body: String) -> Response {
    run_engine(body, solve_starting_wealth).await
}

/// Parses the scenario body and runs `engine` off the async runtime.
async fn run_engine<T, F>(body: String, engine: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&ScenarioParams) -> Result<T, ScenarioError> + Send + 'static,
{
    let params = match ScenarioParams::from_json(&body) {
        Ok(params) => params,
        Err(err) => return scenario_error_response(&err),
    };

    match tokio::task::spawn_blocking(move || engine(&params)).await {
        Ok(Ok(result)) => json_response(StatusCode::OK, result),
        Ok(Err(err)) => scenario_error_response(&err),
        Err(err) => {
            error!("engine task failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation failed", None)
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str, field: Option<&'static str>) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            field,
        },
    )
}

fn scenario_error_response(err: &ScenarioError) -> Response {
    error_response(StatusCode::BAD_REQUEST, &err.to_string(), err.field())
}
