use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use super::types::{
    CashEvent, MAX_ANNUAL_RETURN, MAX_ANNUAL_VOLATILITY, MAX_HORIZON_YEARS, MAX_PATHS, MIN_PATHS,
    ScenarioParams,
};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("oneOffs: duplicate event id {0:?}")]
    DuplicateEventId(String),
    #[error("invalid scenario JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot read scenario: {0}")]
    Io(#[from] std::io::Error),
}

impl ScenarioError {
    /// The offending scenario field, when the error concerns a single field.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ScenarioError::Invalid { field, .. } => Some(*field),
            ScenarioError::DuplicateEventId(_) => Some("oneOffs"),
            _ => None,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ScenarioError {
    ScenarioError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), ScenarioError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, format!("must be between 0 and 1, got {value}")));
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ScenarioError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(field, format!("must be a finite value >= 0, got {value}")));
    }
    Ok(())
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ScenarioError> {
    if !value.is_finite() {
        return Err(invalid(field, "must be finite"));
    }
    Ok(())
}

/// Rejects out-of-range scenario input before any simulation runs.
pub fn validate(params: &ScenarioParams) -> Result<(), ScenarioError> {
    if params.current_age >= params.death_age {
        return Err(invalid("deathAge", "must be greater than currentAge"));
    }
    if params.death_age - params.current_age > MAX_HORIZON_YEARS {
        return Err(invalid(
            "deathAge",
            format!("must be at most {MAX_HORIZON_YEARS} years after currentAge"),
        ));
    }

    check_non_negative("startWealth", params.start_wealth)?;
    if !(0.0..=1.5).contains(&params.liquid_share) {
        return Err(invalid("liquidShare", "must be between 0 and 1.5"));
    }

    check_non_negative("annualExpenseNow", params.annual_expense_now)?;
    if !params.expense_inflation.is_finite() || params.expense_inflation <= -1.0 {
        return Err(invalid("expenseInflation", "must be > -1"));
    }
    check_fraction("spendPctWealth", params.spend_pct_wealth)?;
    check_fraction("guardrails.targetPctWealth", params.guardrails.target_pct_wealth)?;
    check_finite("guardrails.minChange", params.guardrails.min_change)?;
    check_finite("guardrails.maxChange", params.guardrails.max_change)?;

    check_non_negative("philanthropyFixedNow", params.philanthropy_fixed_now)?;
    check_fraction("philanthropyPercent", params.philanthropy_percent)?;

    check_non_negative("desiredTerminalWealth", params.desired_terminal_wealth)?;
    check_non_negative("lifetimeSpendingTotal", params.lifetime_spending_total)?;

    for (field, rate) in [
        ("taxInterest", params.tax_interest),
        ("taxDividends", params.tax_dividends),
        ("taxRealizedGains", params.tax_realized_gains),
        (
            "holdingCompany.germanOwnershipPct",
            params.holding_company.german_ownership_pct,
        ),
        (
            "holdingCompany.usOwnershipPct",
            params.holding_company.us_ownership_pct,
        ),
        (
            "holdingCompany.germanTradeTaxRate",
            params.holding_company.german_trade_tax_rate,
        ),
        (
            "holdingCompany.usCorporateRate",
            params.holding_company.us_corporate_rate,
        ),
        ("publicDivYield", params.public_div_yield),
        ("publicRealizationRate", params.public_realization_rate),
        ("privateRealizationRate", params.private_realization_rate),
    ] {
        check_fraction(field, rate)?;
    }

    let alloc = params.asset_alloc;
    check_non_negative("assetAlloc.public", alloc.public)?;
    check_non_negative("assetAlloc.private", alloc.private)?;
    check_non_negative("assetAlloc.cash", alloc.cash)?;

    let returns = params.asset_return;
    for (field, rate) in [
        ("assetReturn.public", returns.public),
        ("assetReturn.private", returns.private),
        ("assetReturn.cash", returns.cash),
    ] {
        if !rate.is_finite() || rate <= -1.0 || rate > MAX_ANNUAL_RETURN {
            return Err(invalid(
                field,
                format!("must be > -1 and at most {MAX_ANNUAL_RETURN}, got {rate}"),
            ));
        }
    }

    let vol = params.asset_vol;
    for (field, sigma) in [
        ("assetVol.public", vol.public),
        ("assetVol.private", vol.private),
        ("assetVol.cash", vol.cash),
    ] {
        check_non_negative(field, sigma)?;
        if sigma > MAX_ANNUAL_VOLATILITY {
            return Err(invalid(
                field,
                format!("must be at most {MAX_ANNUAL_VOLATILITY}, got {sigma}"),
            ));
        }
    }

    let commitments = &params.private_commitments;
    check_non_negative("privateCommitments.totalCommitment", commitments.total_commitment)?;
    if commitments.call_years < 1 {
        return Err(invalid("privateCommitments.callYears", "must be >= 1"));
    }
    if commitments.dist_years < 1 {
        return Err(invalid("privateCommitments.distYears", "must be >= 1"));
    }
    check_non_negative("privateCommitments.distMultiple", commitments.dist_multiple)?;

    validate_events(&params.one_offs)?;

    if !(MIN_PATHS..=MAX_PATHS).contains(&params.num_paths) {
        return Err(invalid(
            "numPaths",
            format!("must be between {MIN_PATHS} and {MAX_PATHS}"),
        ));
    }

    Ok(())
}

fn validate_events(events: &[CashEvent]) -> Result<(), ScenarioError> {
    let mut seen = HashSet::with_capacity(events.len());
    for event in events {
        if event.id.trim().is_empty() {
            return Err(invalid("oneOffs.id", "every event needs an id"));
        }
        check_finite("oneOffs.amount", event.amount)?;
        if !seen.insert(event.id.as_str()) {
            return Err(ScenarioError::DuplicateEventId(event.id.clone()));
        }
    }
    Ok(())
}

pub fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

/// Gives every event a usable id: blank ids and repeats of an earlier id are
/// replaced with fresh ones.
pub fn assign_event_ids(events: &mut [CashEvent]) {
    let mut seen = HashSet::with_capacity(events.len());
    for event in events.iter_mut() {
        if event.id.trim().is_empty() || seen.contains(&event.id) {
            event.id = new_event_id();
        }
        seen.insert(event.id.clone());
    }
}

impl ScenarioParams {
    /// Imports a scenario document. Missing fields take their defaults and
    /// events are given ids; range checks are left to [`validate`].
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        let mut params: ScenarioParams = serde_json::from_str(json)?;
        assign_event_ids(&mut params.one_offs);
        Ok(params)
    }

    pub fn to_json(&self) -> Result<String, ScenarioError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
