use super::types::{CashEvent, PhilanthropyMode, ScenarioParams, SpendingRule};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OneOffTotals {
    pub inflows: f64,
    pub outflows: f64,
}

fn inflate(amount_now: f64, inflation: f64, year_index: u32) -> f64 {
    amount_now * (1.0 + inflation).powi(year_index as i32)
}

/// Spending for `year_index`, given start-of-year wealth and last year's spend.
pub fn compute_spending(
    params: &ScenarioParams,
    wealth: f64,
    year_index: u32,
    last_year_spend: f64,
) -> f64 {
    let inflation = params.cashflow_inflation();
    match params.spending_rule {
        SpendingRule::Fixed => inflate(params.annual_expense_now, inflation, year_index),
        SpendingRule::PctWealth => params.spend_pct_wealth * wealth,
        SpendingRule::Guardrails => {
            let rails = params.guardrails;
            let target = rails.target_pct_wealth * wealth;
            let lo = last_year_spend * (1.0 + inflation + rails.min_change);
            let hi = last_year_spend * (1.0 + inflation + rails.max_change);
            // min_change > max_change is tolerated by reordering the bounds.
            // f64::clamp panics on a NaN bound; min/max does not.
            target.max(lo.min(hi)).min(lo.max(hi))
        }
    }
}

pub fn compute_philanthropy(params: &ScenarioParams, wealth: f64, year_index: u32) -> f64 {
    match params.philanthropy_mode {
        PhilanthropyMode::PctWealth => params.philanthropy_percent * wealth,
        PhilanthropyMode::Fixed => inflate(
            params.philanthropy_fixed_now,
            params.cashflow_inflation(),
            year_index,
        ),
    }
}

pub fn sum_one_offs(events: &[CashEvent], year_index: u32) -> OneOffTotals {
    events
        .iter()
        .filter(|event| event.year == year_index)
        .fold(OneOffTotals::default(), |mut acc, event| {
            if event.amount > 0.0 {
                acc.inflows += event.amount;
            } else if event.amount < 0.0 {
                acc.outflows += -event.amount;
            }
            acc
        })
}
