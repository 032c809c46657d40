//! Simplified holding-company taxation.
//!
//! Each jurisdiction is a [`TaxRegime`] that turns one year's income
//! decomposition into a [`TaxBreakdown`]. The full and liquid entry points
//! share the same regime and differ only in whether the private bucket's
//! realized gains are part of the income handed to it.
//!
//! The German and U.S. rules are approximations: a flat corporate rate, the
//! participation exemption on dividends, trade tax with an asset-management
//! opt-out, and the treaty withholding ladder on U.S.-sourced dividends.

use super::types::{DividendSource, HoldingCompanyStructure, ScenarioParams, TaxJurisdiction};

pub const GERMAN_CORPORATE_TAX_RATE: f64 = 0.15;
pub const GERMAN_SOLIDARITY_SURCHARGE: f64 = 0.055;
/// Share of dividends still taxable under the participation exemption.
pub const GERMAN_TAXABLE_DIVIDEND_SHARE: f64 = 0.05;
pub const GERMAN_PARTICIPATION_THRESHOLD: f64 = 0.10;
pub const GERMAN_TRADE_TAX_PARTICIPATION_THRESHOLD: f64 = 0.15;

pub const US_WITHHOLDING_STANDARD: f64 = 0.30;
pub const US_WITHHOLDING_TREATY: f64 = 0.05;
pub const US_WITHHOLDING_TREATY_THRESHOLD: f64 = 0.10;
pub const US_WITHHOLDING_EXEMPT_THRESHOLD: f64 = 0.80;

/// One year's taxable income, by type. Negative amounts are treated as zero;
/// there is no loss carry-forward.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaxableIncome {
    pub dividend_income: f64,
    pub interest_income: f64,
    pub public_realized_gains: f64,
    /// Private distributions land here; they are never dividends.
    pub private_realized_gains: f64,
}

impl TaxableIncome {
    fn sanitized(self) -> Self {
        Self {
            dividend_income: self.dividend_income.max(0.0),
            interest_income: self.interest_income.max(0.0),
            public_realized_gains: self.public_realized_gains.max(0.0),
            private_realized_gains: self.private_realized_gains.max(0.0),
        }
    }

    fn without_private(self) -> Self {
        Self {
            private_realized_gains: 0.0,
            ..self
        }
    }

    fn realized_gains(self) -> f64 {
        self.public_realized_gains + self.private_realized_gains
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaxBreakdown {
    /// Corporate (or flat) income tax, including the solidarity surcharge.
    pub income_tax: f64,
    pub trade_tax: f64,
    pub withholding_tax: f64,
}

impl TaxBreakdown {
    pub fn total(self) -> f64 {
        (self.income_tax + self.trade_tax + self.withholding_tax).max(0.0)
    }
}

pub trait TaxRegime {
    fn breakdown(&self, income: &TaxableIncome) -> TaxBreakdown;
}

#[derive(Debug, Clone, Copy)]
pub struct CustomRates {
    pub dividends: f64,
    pub interest: f64,
    pub realized_gains: f64,
}

impl TaxRegime for CustomRates {
    fn breakdown(&self, income: &TaxableIncome) -> TaxBreakdown {
        TaxBreakdown {
            income_tax: income.dividend_income * self.dividends
                + income.public_realized_gains * self.realized_gains
                + income.private_realized_gains * self.realized_gains
                + income.interest_income * self.interest,
            ..TaxBreakdown::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GermanCorporate {
    pub trade_tax_rate: f64,
    pub ownership: f64,
}

impl GermanCorporate {
    pub fn from_structure(structure: &HoldingCompanyStructure) -> Self {
        Self {
            trade_tax_rate: if structure.pure_asset_management {
                0.0
            } else {
                structure.german_trade_tax_rate
            },
            ownership: structure.german_ownership_pct,
        }
    }

    pub fn corporate_rate() -> f64 {
        GERMAN_CORPORATE_TAX_RATE * (1.0 + GERMAN_SOLIDARITY_SURCHARGE)
    }

    pub fn effective_rate(&self) -> f64 {
        Self::corporate_rate() + self.trade_tax_rate
    }
}

impl TaxRegime for GermanCorporate {
    fn breakdown(&self, income: &TaxableIncome) -> TaxBreakdown {
        let corporate_dividend_share = if self.ownership >= GERMAN_PARTICIPATION_THRESHOLD {
            GERMAN_TAXABLE_DIVIDEND_SHARE
        } else {
            1.0
        };
        let trade_dividend_share = if self.ownership >= GERMAN_TRADE_TAX_PARTICIPATION_THRESHOLD {
            0.0
        } else {
            corporate_dividend_share
        };
        let fully_taxable = income.interest_income + income.realized_gains();

        TaxBreakdown {
            income_tax: Self::corporate_rate()
                * (income.dividend_income * corporate_dividend_share + fully_taxable),
            trade_tax: self.trade_tax_rate
                * (income.dividend_income * trade_dividend_share + fully_taxable),
            withholding_tax: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UsCorporate {
    pub rate: f64,
}

impl TaxRegime for UsCorporate {
    fn breakdown(&self, income: &TaxableIncome) -> TaxBreakdown {
        TaxBreakdown {
            income_tax: self.rate
                * (income.dividend_income + income.interest_income + income.realized_gains()),
            ..TaxBreakdown::default()
        }
    }
}

/// German holding receiving public dividends that may be U.S.-sourced. The
/// withholding is charged on top of the German tax, not credited against it.
#[derive(Debug, Clone, Copy)]
pub struct GermanyWithUsWithholding {
    pub german: GermanCorporate,
    pub dividend_source: DividendSource,
    pub us_ownership: f64,
}

impl GermanyWithUsWithholding {
    pub fn withholding_rate(&self) -> f64 {
        if self.us_ownership >= US_WITHHOLDING_EXEMPT_THRESHOLD {
            0.0
        } else if self.us_ownership >= US_WITHHOLDING_TREATY_THRESHOLD {
            US_WITHHOLDING_TREATY
        } else {
            US_WITHHOLDING_STANDARD
        }
    }
}

impl TaxRegime for GermanyWithUsWithholding {
    fn breakdown(&self, income: &TaxableIncome) -> TaxBreakdown {
        let mut breakdown = self.german.breakdown(income);
        if self.dividend_source == DividendSource::Us {
            breakdown.withholding_tax = income.dividend_income * self.withholding_rate();
        }
        breakdown
    }
}

pub fn regime_for(params: &ScenarioParams) -> Box<dyn TaxRegime> {
    let structure = &params.holding_company;
    match params.tax_jurisdiction {
        TaxJurisdiction::Custom => Box::new(CustomRates {
            dividends: params.tax_dividends,
            interest: params.tax_interest,
            realized_gains: params.tax_realized_gains,
        }),
        TaxJurisdiction::Germany => Box::new(GermanCorporate::from_structure(structure)),
        TaxJurisdiction::Us => Box::new(UsCorporate {
            rate: structure.us_corporate_rate,
        }),
        TaxJurisdiction::GermanyUs => Box::new(GermanyWithUsWithholding {
            german: GermanCorporate::from_structure(structure),
            dividend_source: structure.dividend_source,
            us_ownership: structure.us_ownership_pct,
        }),
    }
}

/// A scenario's tax regime, resolved once and reused for every year of a run.
pub struct TaxEngine {
    regime: Box<dyn TaxRegime>,
}

impl TaxEngine {
    pub fn new(params: &ScenarioParams) -> Self {
        Self {
            regime: regime_for(params),
        }
    }

    pub fn full_breakdown(&self, income: &TaxableIncome) -> TaxBreakdown {
        self.regime.breakdown(&income.sanitized())
    }

    pub fn full_tax(&self, income: &TaxableIncome) -> f64 {
        self.full_breakdown(income).total()
    }

    /// Tax attributable to the liquid (public + cash) buckets only.
    pub fn liquid_tax(&self, income: &TaxableIncome) -> f64 {
        self.regime
            .breakdown(&income.sanitized().without_private())
            .total()
    }
}

pub fn compute_full_tax(params: &ScenarioParams, income: &TaxableIncome) -> f64 {
    TaxEngine::new(params).full_tax(income)
}

pub fn compute_liquid_tax(params: &ScenarioParams, income: &TaxableIncome) -> f64 {
    TaxEngine::new(params).liquid_tax(income)
}

pub fn compute_full_breakdown(params: &ScenarioParams, income: &TaxableIncome) -> TaxBreakdown {
    TaxEngine::new(params).full_breakdown(income)
}
