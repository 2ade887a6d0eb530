//! Price sample and report types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Epoch seconds
pub type EpochSeconds = i64;

/// One row of the day-ahead price series as read from the data source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSample {
    /// Start of the price period
    pub time: EpochSeconds,

    /// Price before tax
    pub base_price: Decimal,

    /// Tax rate as a fraction (0.24 for 24 %)
    pub tax_rate: Decimal,
}

impl PriceSample {
    pub fn new(time: EpochSeconds, base_price: Decimal, tax_rate: Decimal) -> Self {
        Self { time, base_price, tax_rate }
    }
}

/// A sample after tax and margin have been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustedPrice {
    pub time: EpochSeconds,

    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Aggregates over one calendar day of adjusted prices
///
/// Every aggregate is `None` when the bucket is empty. `samples` is `None`
/// only when the bucket was withheld as incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    #[serde(rename = "avg", with = "rust_decimal::serde::float_option")]
    pub average: Option<Decimal>,

    pub cheapest: Option<AdjustedPrice>,

    pub most_expensive: Option<AdjustedPrice>,

    /// Price in effect at the bucket's reference instant
    #[serde(rename = "now")]
    pub current: Option<AdjustedPrice>,

    #[serde(rename = "prices")]
    pub samples: Option<Vec<AdjustedPrice>>,
}

impl DayBucket {
    /// Bucket reported for a day whose data is not yet complete
    pub fn withheld() -> Self {
        Self::default()
    }

    pub fn is_withheld(&self) -> bool {
        self.samples.is_none()
    }

    pub fn len(&self) -> usize {
        self.samples.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a statistics run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceReport {
    /// Reference instant the report was computed for
    pub now: EpochSeconds,

    pub today: DayBucket,

    pub tomorrow: DayBucket,
}
