use serde::{Deserialize, Serialize};

/// Hard ceiling on Monte Carlo paths. Scenarios asking for more are rejected.
pub const MAX_PATHS: u32 = 2_000;
pub const MIN_PATHS: u32 = 100;
/// Longest projection accepted, in years between `currentAge` and `deathAge`.
pub const MAX_HORIZON_YEARS: u32 = 150;
/// Upper bound on any expected annual return (100%).
pub const MAX_ANNUAL_RETURN: f64 = 1.0;
/// Upper bound on any annual volatility.
pub const MAX_ANNUAL_VOLATILITY: f64 = 1.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SpendingRule {
    #[serde(rename = "fixed")]
    Fixed,
    #[serde(rename = "%wealth", alias = "pctWealth", alias = "pct-wealth")]
    PctWealth,
    #[serde(rename = "guardrails")]
    Guardrails,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PhilanthropyMode {
    #[serde(rename = "fixed")]
    Fixed,
    #[serde(rename = "%wealth", alias = "pctWealth", alias = "pct-wealth")]
    PctWealth,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationMode {
    Forward,
    Reverse,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaxJurisdiction {
    Custom,
    Germany,
    Us,
    #[serde(alias = "germanyUs", alias = "germany_us")]
    GermanyUs,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DividendSource {
    Us,
    Other,
}

/// A {public, private, cash} triple. Used for weights, expected returns and
/// volatilities alike.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetMix {
    pub public: f64,
    pub private: f64,
    pub cash: f64,
}

impl AssetMix {
    pub fn new(public: f64, private: f64, cash: f64) -> Self {
        Self {
            public,
            private,
            cash,
        }
    }

    pub fn sum(self) -> f64 {
        self.public + self.private + self.cash
    }

    /// Rescales the weights to sum to 1. An all-zero mix is returned as-is and
    /// means no capital is at risk.
    pub fn normalized(self) -> Self {
        let total = self.sum();
        if total == 0.0 {
            return self;
        }
        Self {
            public: self.public / total,
            private: self.private / total,
            cash: self.cash / total,
        }
    }

    pub fn weighted_sum(self, rates: AssetMix) -> f64 {
        self.public * rates.public + self.private * rates.private + self.cash * rates.cash
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuardrailParams {
    pub target_pct_wealth: f64,
    pub min_change: f64,
    pub max_change: f64,
}

impl Default for GuardrailParams {
    fn default() -> Self {
        Self {
            target_pct_wealth: 0.035,
            min_change: -0.10,
            max_change: 0.10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HoldingCompanyStructure {
    pub dividend_source: DividendSource,
    /// Participation in the dividend-paying company, for the German exemptions.
    pub german_ownership_pct: f64,
    /// Participation used for the U.S. treaty withholding ladder.
    pub us_ownership_pct: f64,
    /// Pure asset-management holdings opt out of German trade tax.
    pub pure_asset_management: bool,
    pub german_trade_tax_rate: f64,
    pub us_corporate_rate: f64,
}

impl Default for HoldingCompanyStructure {
    fn default() -> Self {
        Self {
            dividend_source: DividendSource::Other,
            german_ownership_pct: 0.0,
            us_ownership_pct: 0.0,
            pure_asset_management: false,
            german_trade_tax_rate: 0.14,
            us_corporate_rate: 0.21,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrivateCommitments {
    pub enabled: bool,
    pub total_commitment: f64,
    pub call_years: u32,
    pub dist_lag_years: u32,
    pub dist_years: u32,
    /// Multiple on called capital paid back over the distribution window.
    pub dist_multiple: f64,
}

impl Default for PrivateCommitments {
    fn default() -> Self {
        Self {
            enabled: false,
            total_commitment: 5_000_000.0,
            call_years: 4,
            dist_lag_years: 3,
            dist_years: 5,
            dist_multiple: 1.8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashEvent {
    #[serde(default)]
    pub id: String,
    pub year: u32,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioParams {
    pub current_age: u32,
    pub death_age: u32,

    pub start_wealth: f64,
    pub liquid_share: f64,

    pub spending_rule: SpendingRule,
    pub annual_expense_now: f64,
    pub expense_inflation: f64,
    pub spend_pct_wealth: f64,
    pub guardrails: GuardrailParams,

    pub philanthropy_mode: PhilanthropyMode,
    pub philanthropy_fixed_now: f64,
    pub philanthropy_percent: f64,

    pub real_mode: bool,

    pub desired_terminal_wealth: f64,
    pub lifetime_spending_total: f64,
    pub calculation_mode: CalculationMode,

    pub tax_jurisdiction: TaxJurisdiction,
    pub tax_interest: f64,
    pub tax_dividends: f64,
    pub tax_realized_gains: f64,
    pub holding_company: HoldingCompanyStructure,

    pub asset_alloc: AssetMix,
    pub asset_return: AssetMix,
    pub asset_vol: AssetMix,
    pub public_div_yield: f64,
    pub public_realization_rate: f64,
    pub private_realization_rate: f64,

    pub private_commitments: PrivateCommitments,
    pub one_offs: Vec<CashEvent>,

    pub run_monte_carlo: bool,
    pub num_paths: u32,
    pub seed: u64,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            current_age: 50,
            death_age: 90,
            start_wealth: 50_000_000.0,
            liquid_share: 0.6,
            spending_rule: SpendingRule::Fixed,
            annual_expense_now: 500_000.0,
            expense_inflation: 0.02,
            spend_pct_wealth: 0.03,
            guardrails: GuardrailParams::default(),
            philanthropy_mode: PhilanthropyMode::Fixed,
            philanthropy_fixed_now: 100_000.0,
            philanthropy_percent: 0.01,
            real_mode: false,
            desired_terminal_wealth: 20_000_000.0,
            lifetime_spending_total: 0.0,
            calculation_mode: CalculationMode::Forward,
            tax_jurisdiction: TaxJurisdiction::Custom,
            tax_interest: 0.25,
            tax_dividends: 0.25,
            tax_realized_gains: 0.25,
            holding_company: HoldingCompanyStructure::default(),
            asset_alloc: AssetMix::new(0.6, 0.3, 0.1),
            asset_return: AssetMix::new(0.07, 0.10, 0.02),
            asset_vol: AssetMix::new(0.16, 0.20, 0.01),
            public_div_yield: 0.02,
            public_realization_rate: 0.3,
            private_realization_rate: 0.2,
            private_commitments: PrivateCommitments::default(),
            one_offs: Vec::new(),
            run_monte_carlo: false,
            num_paths: 500,
            seed: 42,
        }
    }
}

impl ScenarioParams {
    /// Number of simulated years after the starting year; rows cover `0..=years`.
    pub fn years(&self) -> u32 {
        self.death_age.saturating_sub(self.current_age).max(1)
    }

    /// Inflation applied to fixed nominal cashflows; zero in real mode.
    pub fn cashflow_inflation(&self) -> f64 {
        if self.real_mode {
            0.0
        } else {
            self.expense_inflation
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRow {
    pub year: u32,
    pub age: u32,
    pub wealth: f64,
    pub liquid_wealth: f64,
    pub expense: f64,
    pub philanthropy: f64,
    pub total_inflows: f64,
    pub total_outflows: f64,
    pub taxes: f64,
    pub liquid_taxes: f64,
    pub net_return: f64,
    pub liquidity_years: f64,
    pub private_call: f64,
    pub private_distribution: f64,
    pub dividend_income: f64,
    pub interest_income: f64,
    pub public_realized_gains: f64,
    pub public_unrealized_gains: f64,
    pub private_realized_gains: f64,
    pub private_unrealized_gains: f64,
    pub gross_return_pct: f64,
    pub net_return_pct: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub total_spending: f64,
    pub total_philanthropy: f64,
    pub total_taxes: f64,
    pub total_returns: f64,
    pub terminal_wealth: f64,
}

impl RunTotals {
    pub fn from_rows(rows: &[SimulationRow]) -> Self {
        let mut totals = rows.iter().fold(Self::default(), |acc, row| Self {
            total_spending: acc.total_spending + row.expense,
            total_philanthropy: acc.total_philanthropy + row.philanthropy,
            total_taxes: acc.total_taxes + row.taxes,
            total_returns: acc.total_returns + row.net_return,
            terminal_wealth: 0.0,
        });
        totals.terminal_wealth = rows.last().map_or(0.0, |row| row.wealth);
        totals
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeterministicResult {
    pub rows: Vec<SimulationRow>,
    /// Index of the first row with wealth <= 0, or -1.
    pub broke_year: i32,
    pub summary: RunTotals,
}

impl DeterministicResult {
    pub fn terminal_wealth(&self) -> f64 {
        self.summary.terminal_wealth
    }

    pub fn went_broke(&self) -> bool {
        self.broke_year >= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileBand {
    pub year: u32,
    pub age: u32,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloResult {
    pub num_paths: u32,
    pub seed: u64,
    pub paths: Vec<Vec<f64>>,
    pub bands: Vec<PercentileBand>,
    pub ruin_probability: f64,
    pub median_terminal_wealth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_start_wealth: f64,
    pub terminal_wealth: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseCalculationResult {
    pub required_starting_wealth: f64,
    pub calculated_terminal_wealth: f64,
    pub desired_terminal_wealth: f64,
    pub total_spending: f64,
    pub total_philanthropy: f64,
    pub total_taxes: f64,
    pub total_returns: f64,
    pub converged: bool,
    pub message: String,
    pub iterations: Vec<SolveIteration>,
    pub rows: Vec<SimulationRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_rescales_to_unit_sum() {
        let mix = AssetMix::new(3.0, 1.0, 1.0).normalized();
        assert!((mix.sum() - 1.0).abs() <= 1e-12);
        assert!((mix.public - 0.6).abs() <= 1e-12);
        assert!((mix.private - 0.2).abs() <= 1e-12);
    }

    #[test]
    fn normalized_leaves_zero_mix_untouched() {
        let mix = AssetMix::default();
        assert_eq!(mix.normalized(), mix);
    }

    #[test]
    fn years_is_at_least_one() {
        let mut params = ScenarioParams::default();
        params.current_age = 60;
        params.death_age = 60;
        assert_eq!(params.years(), 1);
        params.death_age = 95;
        assert_eq!(params.years(), 35);
    }

    #[test]
    fn run_totals_sum_rows_and_take_last_wealth() {
        let rows = vec![
            SimulationRow {
                expense: 10.0,
                philanthropy: 1.0,
                taxes: 2.0,
                net_return: 5.0,
                wealth: 100.0,
                ..SimulationRow::default()
            },
            SimulationRow {
                year: 1,
                expense: 11.0,
                philanthropy: 1.5,
                taxes: 3.0,
                net_return: -4.0,
                wealth: 80.0,
                ..SimulationRow::default()
            },
        ];
        let totals = RunTotals::from_rows(&rows);
        assert_eq!(totals.total_spending, 21.0);
        assert_eq!(totals.total_philanthropy, 2.5);
        assert_eq!(totals.total_taxes, 5.0);
        assert_eq!(totals.total_returns, 1.0);
        assert_eq!(totals.terminal_wealth, 80.0);
    }
}
