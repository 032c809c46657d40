use tracing::{debug, info, warn};

use super::engine::run_deterministic;
use super::types::{
    DeterministicResult, ReverseCalculationResult, ScenarioParams, SolveIteration,
};
use super::validation::{ScenarioError, validate};

pub const SOLVER_TOLERANCE: f64 = 1_000.0;
pub const SOLVER_MAX_ITERATIONS: u32 = 50;
pub const DEFAULT_SEARCH_CEILING: f64 = 1_000_000_000.0;

/// Bisects `start_wealth` until the projected terminal wealth lands within
/// [`SOLVER_TOLERANCE`] of `desired_terminal_wealth`. If the iteration cap is
/// hit first, the last midpoint is returned with `converged = false`.
pub fn solve_starting_wealth(
    params: &ScenarioParams,
) -> Result<ReverseCalculationResult, ScenarioError> {
    validate(params)?;

    let target = params.desired_terminal_wealth;
    let (mut lo, mut hi) = search_bounds(params);
    let mut iterations = Vec::with_capacity(SOLVER_MAX_ITERATIONS as usize);
    let mut converged = false;

    let (candidate, result) = loop {
        let candidate = (lo + hi) * 0.5;
        let result = run_with_start_wealth(params, candidate);
        let terminal = result.terminal_wealth();
        let iteration = iterations.len() as u32 + 1;
        iterations.push(SolveIteration {
            iteration,
            lower_bound: lo,
            upper_bound: hi,
            candidate_start_wealth: candidate,
            terminal_wealth: terminal,
        });
        debug!(iteration, candidate, terminal, target, "reverse solver step");

        if (terminal - target).abs() <= SOLVER_TOLERANCE {
            converged = true;
            break (candidate, result);
        }
        if iteration >= SOLVER_MAX_ITERATIONS {
            break (candidate, result);
        }
        if terminal > target {
            hi = candidate;
        } else {
            lo = candidate;
        }
    };

    let message = if converged {
        info!(
            iterations = iterations.len(),
            required_starting_wealth = candidate,
            "reverse solver converged"
        );
        "Solved required starting wealth.".to_string()
    } else {
        warn!(
            iterations = iterations.len(),
            gap = result.terminal_wealth() - target,
            "reverse solver hit the iteration cap"
        );
        "Reached max iterations before tolerance was met; returning best estimate.".to_string()
    };

    let summary = result.summary;
    Ok(ReverseCalculationResult {
        required_starting_wealth: candidate,
        calculated_terminal_wealth: summary.terminal_wealth,
        desired_terminal_wealth: target,
        total_spending: summary.total_spending,
        total_philanthropy: summary.total_philanthropy,
        total_taxes: summary.total_taxes,
        total_returns: summary.total_returns,
        converged,
        message,
        iterations,
        rows: result.rows,
    })
}

/// Starting interval. A known lifetime spending total gives a rough estimate
/// that lifts the floor and, when large, the ceiling.
fn search_bounds(params: &ScenarioParams) -> (f64, f64) {
    if params.lifetime_spending_total > 0.0 {
        let estimate = 0.5 * (params.lifetime_spending_total + params.desired_terminal_wealth);
        (estimate.max(0.0), DEFAULT_SEARCH_CEILING.max(2.0 * estimate))
    } else {
        (0.0, DEFAULT_SEARCH_CEILING)
    }
}

fn run_with_start_wealth(params: &ScenarioParams, start_wealth: f64) -> DeterministicResult {
    let mut candidate = params.clone();
    candidate.start_wealth = start_wealth;
    run_deterministic(&candidate)
}
