mod cashflow;
mod commitments;
mod engine;
mod monte_carlo;
mod solver;
mod tax;
mod types;
mod validation;

pub use cashflow::{OneOffTotals, compute_philanthropy, compute_spending, sum_one_offs};
pub use commitments::{CommitmentSchedule, schedule_commitments};
pub use engine::{run_deterministic, run_deterministic_with_returns, simulate};
pub use monte_carlo::run_monte_carlo;
pub use solver::{SOLVER_MAX_ITERATIONS, SOLVER_TOLERANCE, solve_starting_wealth};
pub use tax::{
    TaxBreakdown, TaxEngine, TaxRegime, TaxableIncome, compute_full_breakdown, compute_full_tax,
    compute_liquid_tax, regime_for,
};
pub use types::{
    AssetMix, CalculationMode, CashEvent, DeterministicResult, DividendSource, GuardrailParams,
    HoldingCompanyStructure, MAX_ANNUAL_RETURN, MAX_ANNUAL_VOLATILITY, MAX_HORIZON_YEARS, MAX_PATHS,
    MIN_PATHS, MonteCarloResult, PercentileBand,
    PhilanthropyMode, PrivateCommitments, ReverseCalculationResult, RunTotals, ScenarioParams,
    SimulationRow, SolveIteration, SpendingRule, TaxJurisdiction,
};
pub use validation::{ScenarioError, assign_event_ids, new_event_id, validate};
