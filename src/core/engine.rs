use super::cashflow::{compute_philanthropy, compute_spending, sum_one_offs};
use super::commitments::{CommitmentSchedule, schedule_commitments};
use super::tax::{TaxEngine, TaxableIncome};
use super::types::{AssetMix, DeterministicResult, RunTotals, ScenarioParams, SimulationRow};
use super::validation::{ScenarioError, validate};

/// Share of a year's cashflows assumed to have happened before returns accrue.
const MID_YEAR_TIMING: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct YearState {
    wealth: f64,
    liquid_wealth: f64,
    last_year_spend: f64,
}

impl YearState {
    fn initial(params: &ScenarioParams) -> Self {
        Self {
            wealth: params.start_wealth,
            liquid_wealth: params.start_wealth * params.liquid_share.clamp(0.0, 1.0),
            last_year_spend: params.annual_expense_now,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ReturnDecomposition {
    gross_return: f64,
    liquid_return: f64,
    income: TaxableIncome,
    public_unrealized_gains: f64,
    private_unrealized_gains: f64,
}

/// Everything that stays fixed across the years of one run.
struct Projection<'a> {
    params: &'a ScenarioParams,
    alloc: AssetMix,
    returns: AssetMix,
    schedule: CommitmentSchedule,
    tax: TaxEngine,
}

impl<'a> Projection<'a> {
    fn new(params: &'a ScenarioParams, returns: AssetMix) -> Self {
        Self {
            params,
            alloc: params.asset_alloc.normalized(),
            returns,
            schedule: schedule_commitments(&params.private_commitments, params.years()),
            tax: TaxEngine::new(params),
        }
    }

    fn decompose(&self, base: f64) -> ReturnDecomposition {
        let params = self.params;
        let w = self.alloc;
        let r = self.returns;

        let public_base = base * w.public;
        let private_base = base * w.private;
        let cash_base = base * w.cash;

        let dividend_income = public_base * params.public_div_yield;
        let public_price_return = (r.public - params.public_div_yield).max(0.0);
        let public_realized_gains =
            public_base * public_price_return * params.public_realization_rate;
        let public_unrealized_gains = public_base * r.public - dividend_income - public_realized_gains;

        let private_realized_gains =
            private_base * r.private.max(0.0) * params.private_realization_rate;
        let private_unrealized_gains = private_base * r.private - private_realized_gains;

        let interest_income = cash_base * r.cash;

        ReturnDecomposition {
            gross_return: w.weighted_sum(r),
            liquid_return: w.public * r.public + w.cash * r.cash,
            income: TaxableIncome {
                dividend_income,
                interest_income,
                public_realized_gains,
                private_realized_gains,
            },
            public_unrealized_gains,
            private_unrealized_gains,
        }
    }

    fn step(&self, state: &YearState, year: u32) -> (YearState, SimulationRow) {
        let params = self.params;

        let expense = compute_spending(params, state.wealth, year, state.last_year_spend);
        let philanthropy = compute_philanthropy(params, state.wealth, year);
        let one_offs = sum_one_offs(&params.one_offs, year);
        let private_call = self.schedule.call(year);
        let private_distribution = self.schedule.distribution(year);

        // Calls and distributions move value between the liquid and private
        // buckets; they do not change total wealth.
        let total_inflows = one_offs.inflows;
        let total_outflows = expense + philanthropy + one_offs.outflows;

        let base = (state.wealth - MID_YEAR_TIMING * total_outflows
            + MID_YEAR_TIMING * total_inflows)
            .max(0.0);
        let decomposition = self.decompose(base);

        let taxes = self.tax.full_tax(&decomposition.income);
        let liquid_taxes = self.tax.liquid_tax(&decomposition.income);

        let net_return = base * decomposition.gross_return - taxes;
        let wealth = state.wealth + total_inflows + net_return - total_outflows;

        // Private returns and their taxes stay out of the liquid ledger.
        let liquid_net_return = base * decomposition.liquid_return - liquid_taxes;
        let liquid_wealth = state.liquid_wealth + total_inflows + liquid_net_return
            - total_outflows
            - private_call
            + private_distribution;

        let liquidity_years = liquid_wealth / (expense + philanthropy).max(1.0);

        let row = SimulationRow {
            year,
            age: params.current_age + year,
            wealth,
            liquid_wealth,
            expense,
            philanthropy,
            total_inflows,
            total_outflows,
            taxes,
            liquid_taxes,
            net_return,
            liquidity_years,
            private_call,
            private_distribution,
            dividend_income: decomposition.income.dividend_income,
            interest_income: decomposition.income.interest_income,
            public_realized_gains: decomposition.income.public_realized_gains,
            public_unrealized_gains: decomposition.public_unrealized_gains,
            private_realized_gains: decomposition.income.private_realized_gains,
            private_unrealized_gains: decomposition.private_unrealized_gains,
            gross_return_pct: decomposition.gross_return,
            net_return_pct: if base > 0.0 { net_return / base } else { 0.0 },
        };

        let next = YearState {
            wealth,
            liquid_wealth,
            last_year_spend: expense,
        };
        (next, row)
    }
}

/// Validates the scenario and projects it with its expected returns.
pub fn simulate(params: &ScenarioParams) -> Result<DeterministicResult, ScenarioError> {
    validate(params)?;
    Ok(run_deterministic(params))
}

/// Projects an already-validated scenario with its expected returns.
pub fn run_deterministic(params: &ScenarioParams) -> DeterministicResult {
    run_deterministic_with_returns(params, params.asset_return)
}

/// Projects an already-validated scenario with the given per-year returns in
/// place of `asset_return`. Stops after the first year that ends with wealth
/// at or below zero, or with wealth that is no longer finite.
pub fn run_deterministic_with_returns(
    params: &ScenarioParams,
    returns: AssetMix,
) -> DeterministicResult {
    let projection = Projection::new(params, returns);
    let years = params.years();

    let mut rows = Vec::with_capacity(years as usize + 1);
    let mut state = YearState::initial(params);
    let mut broke_year = -1;
    for year in 0..=years {
        let (next, row) = projection.step(&state, year);
        // NaN wealth (overflowed returns) counts as ruin; +inf only ends the run.
        let broke = row.wealth.is_nan() || row.wealth <= 0.0;
        let overflowed = row.wealth.is_infinite();
        rows.push(row);
        state = next;
        if broke {
            broke_year = year as i32;
            break;
        }
        if overflowed {
            break;
        }
    }

    let summary = RunTotals::from_rows(&rows);
    DeterministicResult {
        rows,
        broke_year,
        summary,
    }
}
