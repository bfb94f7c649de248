//! Instrument records: one immutable row per candidate instrument.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::InstrumentId;
use crate::error::{IndexError, IndexResult};

/// Boolean eligibility flags carried by a record.
///
/// A set flag marks the instrument as ineligible for stages that exclude it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityFlags {
    /// Under special treatment (ST) or suspended.
    pub special_treatment: bool,

    /// Subject to a material regulatory violation.
    pub violation: bool,

    /// Material loss in the latest reporting period.
    pub loss_making: bool,

    /// Abnormal price behaviour.
    pub abnormal_price: bool,
}

/// A candidate instrument in a universe snapshot.
///
/// Records are value objects: construct once, never mutate. The sizing and
/// ranking metrics used by the engine are read through [`crate::Field`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    /// Unique identifier within the snapshot.
    pub id: InstrumentId,

    /// Display name.
    pub name: String,

    /// Industry classification.
    pub industry: String,

    /// Market capitalization.
    pub market_cap: f64,

    /// Last price.
    pub price: f64,

    /// Shares outstanding.
    pub shares: f64,

    /// Average daily traded value.
    #[serde(default)]
    pub turnover: f64,

    /// Free cash flow (default sizing metric; may be non-positive before screening).
    #[serde(default)]
    pub free_cash_flow: f64,

    /// Enterprise value (market cap plus net debt).
    #[serde(default)]
    pub enterprise_value: f64,

    /// Operating cash flow.
    #[serde(default)]
    pub operating_cash_flow: f64,

    /// Operating profit.
    #[serde(default)]
    pub operating_profit: f64,

    /// Months since listing.
    #[serde(default)]
    pub listing_months: u32,

    /// ROE stability score in [0, 1].
    #[serde(default)]
    pub roe_stability: Option<f64>,

    /// Additional named quality scores.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_scores: BTreeMap<String, f64>,

    /// Eligibility flags.
    #[serde(default)]
    pub flags: EligibilityFlags,
}

impl InstrumentRecord {
    /// Creates a new record builder.
    #[must_use]
    pub fn builder() -> InstrumentRecordBuilder {
        InstrumentRecordBuilder::new()
    }

    /// Free cash flow yield: free cash flow over enterprise value.
    ///
    /// Zero when enterprise value is not positive.
    #[must_use]
    pub fn fcf_yield(&self) -> f64 {
        if self.enterprise_value > 0.0 {
            self.free_cash_flow / self.enterprise_value
        } else {
            0.0
        }
    }

    /// Operating cash flow as a multiple of operating profit.
    ///
    /// Zero when operating profit is not positive.
    #[must_use]
    pub fn ocf_to_profit(&self) -> f64 {
        if self.operating_profit > 0.0 {
            self.operating_cash_flow / self.operating_profit
        } else {
            0.0
        }
    }

    /// Price times shares outstanding.
    #[must_use]
    pub fn market_value(&self) -> f64 {
        self.price * self.shares
    }

    /// Returns a named quality score.
    #[must_use]
    pub fn score(&self, name: &str) -> Option<f64> {
        self.extra_scores.get(name).copied()
    }

    /// Checks the record's structural invariants.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidRecord`] when the identifier is blank or
    /// price, shares, or market cap is not a positive finite number.
    pub fn validate(&self) -> IndexResult<()> {
        if self.id.is_blank() {
            return Err(IndexError::invalid_record("<blank>", "identifier is empty"));
        }
        for (label, value) in [
            ("price", self.price),
            ("shares", self.shares),
            ("market_cap", self.market_cap),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(IndexError::invalid_record(
                    self.id.as_str(),
                    format!("{label} must be positive, got {value}"),
                ));
            }
        }
        if self.turnover < 0.0 {
            return Err(IndexError::invalid_record(
                self.id.as_str(),
                format!("turnover must be non-negative, got {}", self.turnover),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing an [`InstrumentRecord`].
#[derive(Debug, Clone, Default)]
pub struct InstrumentRecordBuilder {
    id: Option<InstrumentId>,
    name: Option<String>,
    industry: Option<String>,
    market_cap: Option<f64>,
    price: Option<f64>,
    shares: Option<f64>,
    turnover: f64,
    free_cash_flow: f64,
    enterprise_value: f64,
    operating_cash_flow: f64,
    operating_profit: f64,
    listing_months: u32,
    roe_stability: Option<f64>,
    extra_scores: BTreeMap<String, f64>,
    flags: EligibilityFlags,
}

impl InstrumentRecordBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identifier.
    #[must_use]
    pub fn id(mut self, id: impl Into<InstrumentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the industry.
    #[must_use]
    pub fn industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    /// Sets the market capitalization. Defaults to price times shares.
    #[must_use]
    pub fn market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }

    /// Sets the price.
    #[must_use]
    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Sets shares outstanding.
    #[must_use]
    pub fn shares(mut self, shares: f64) -> Self {
        self.shares = Some(shares);
        self
    }

    /// Sets average daily turnover.
    #[must_use]
    pub fn turnover(mut self, turnover: f64) -> Self {
        self.turnover = turnover;
        self
    }

    /// Sets free cash flow.
    #[must_use]
    pub fn free_cash_flow(mut self, fcf: f64) -> Self {
        self.free_cash_flow = fcf;
        self
    }

    /// Sets enterprise value.
    #[must_use]
    pub fn enterprise_value(mut self, ev: f64) -> Self {
        self.enterprise_value = ev;
        self
    }

    /// Sets operating cash flow.
    #[must_use]
    pub fn operating_cash_flow(mut self, ocf: f64) -> Self {
        self.operating_cash_flow = ocf;
        self
    }

    /// Sets operating profit.
    #[must_use]
    pub fn operating_profit(mut self, profit: f64) -> Self {
        self.operating_profit = profit;
        self
    }

    /// Sets months since listing.
    #[must_use]
    pub fn listing_months(mut self, months: u32) -> Self {
        self.listing_months = months;
        self
    }

    /// Sets the ROE stability score.
    #[must_use]
    pub fn roe_stability(mut self, score: f64) -> Self {
        self.roe_stability = Some(score);
        self
    }

    /// Adds a named quality score.
    #[must_use]
    pub fn score(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extra_scores.insert(name.into(), value);
        self
    }

    /// Sets the eligibility flags.
    #[must_use]
    pub fn flags(mut self, flags: EligibilityFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builds and validates the record.
    ///
    /// # Errors
    ///
    /// Returns an error if id, price, or shares are missing, or if the
    /// resulting record fails [`InstrumentRecord::validate`].
    pub fn build(self) -> IndexResult<InstrumentRecord> {
        let id = self
            .id
            .ok_or_else(|| IndexError::invalid_record("<unset>", "missing id"))?;
        let price = self
            .price
            .ok_or_else(|| IndexError::invalid_record(id.as_str(), "missing price"))?;
        let shares = self
            .shares
            .ok_or_else(|| IndexError::invalid_record(id.as_str(), "missing shares"))?;

        let record = InstrumentRecord {
            name: self.name.unwrap_or_else(|| id.to_string()),
            industry: self.industry.unwrap_or_default(),
            market_cap: self.market_cap.unwrap_or(price * shares),
            price,
            shares,
            turnover: self.turnover,
            free_cash_flow: self.free_cash_flow,
            enterprise_value: self.enterprise_value,
            operating_cash_flow: self.operating_cash_flow,
            operating_profit: self.operating_profit,
            listing_months: self.listing_months,
            roe_stability: self.roe_stability,
            extra_scores: self.extra_scores,
            flags: self.flags,
            id,
        };
        record.validate()?;
        Ok(record)
    }
}
