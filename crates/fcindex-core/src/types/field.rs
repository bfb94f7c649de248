//! Named accessors over instrument records.
//!
//! Screening rules, the ranking metric, and the sizing metric all refer to
//! record values by [`Field`], which keeps configuration declarative.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::InstrumentRecord;

/// A numeric value readable from an [`InstrumentRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Market capitalization.
    MarketCap,
    /// Last price.
    Price,
    /// Shares outstanding.
    Shares,
    /// Average daily traded value.
    Turnover,
    /// Free cash flow.
    FreeCashFlow,
    /// Enterprise value.
    EnterpriseValue,
    /// Operating cash flow.
    OperatingCashFlow,
    /// Operating profit.
    OperatingProfit,
    /// Free cash flow over enterprise value.
    FcfYield,
    /// Operating cash flow over operating profit.
    OcfToProfit,
    /// ROE stability score.
    RoeStability,
    /// Months since listing.
    ListingMonths,
    /// A named entry in `extra_scores`.
    Score(String),
}

impl Field {
    /// Reads the field from a record.
    ///
    /// Returns `None` when the record does not carry the value.
    #[must_use]
    pub fn value(&self, record: &InstrumentRecord) -> Option<f64> {
        let value = match self {
            Self::MarketCap => Some(record.market_cap),
            Self::Price => Some(record.price),
            Self::Shares => Some(record.shares),
            Self::Turnover => Some(record.turnover),
            Self::FreeCashFlow => Some(record.free_cash_flow),
            Self::EnterpriseValue => Some(record.enterprise_value),
            Self::OperatingCashFlow => Some(record.operating_cash_flow),
            Self::OperatingProfit => Some(record.operating_profit),
            Self::FcfYield => Some(record.fcf_yield()),
            Self::OcfToProfit => Some(record.ocf_to_profit()),
            Self::RoeStability => record.roe_stability,
            Self::ListingMonths => Some(f64::from(record.listing_months)),
            Self::Score(name) => record.score(name),
        };
        value.filter(|v| !v.is_nan())
    }

    /// Returns a short name for logs and audit trails.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::MarketCap => "market_cap",
            Self::Price => "price",
            Self::Shares => "shares",
            Self::Turnover => "turnover",
            Self::FreeCashFlow => "free_cash_flow",
            Self::EnterpriseValue => "enterprise_value",
            Self::OperatingCashFlow => "operating_cash_flow",
            Self::OperatingProfit => "operating_profit",
            Self::FcfYield => "fcf_yield",
            Self::OcfToProfit => "ocf_to_profit",
            Self::RoeStability => "roe_stability",
            Self::ListingMonths => "listing_months",
            Self::Score(name) => name,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An eligibility flag on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// Special treatment or suspension.
    SpecialTreatment,
    /// Regulatory violation.
    Violation,
    /// Loss-making.
    LossMaking,
    /// Abnormal price behaviour.
    AbnormalPrice,
}

impl Flag {
    /// Returns true if the flag is set on the record.
    #[must_use]
    pub fn is_set(self, record: &InstrumentRecord) -> bool {
        let flags = &record.flags;
        match self {
            Self::SpecialTreatment => flags.special_treatment,
            Self::Violation => flags.violation,
            Self::LossMaking => flags.loss_making,
            Self::AbnormalPrice => flags.abnormal_price,
        }
    }

    /// Returns a short name for logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SpecialTreatment => "special_treatment",
            Self::Violation => "violation",
            Self::LossMaking => "loss_making",
            Self::AbnormalPrice => "abnormal_price",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
