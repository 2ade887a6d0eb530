//! Telemetry data access

use async_trait::async_trait;
use price_statistics::{EpochSeconds, PriceSample};
use rust_decimal::Decimal;

use crate::error::StoreResult;

/// A row as a JSON object keyed by column name
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Tables the service reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Electricity,
    Water,
    ElectricityPrices,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Electricity => "electricity",
            Table::Water => "water",
            Table::ElectricityPrices => "electricity_prices",
        }
    }
}

/// Ordering of a time series query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Raw row of the electricity price table
///
/// Columns may be NULL in the table; such rows are filtered by [`PriceRow::into_sample`].
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub time: Option<EpochSeconds>,
    pub price: Option<Decimal>,
    pub alv: Option<Decimal>,
}

impl PriceRow {
    /// Rows without a time or price are unusable; a missing tax rate means untaxed
    pub fn into_sample(self) -> Option<PriceSample> {
        Some(PriceSample::new(self.time?, self.price?, self.alv.unwrap_or(Decimal::ZERO)))
    }
}

/// Convert rows to samples, logging the ones that had to be skipped
pub fn price_samples(rows: Vec<PriceRow>) -> Vec<PriceSample> {
    let total = rows.len();
    let samples: Vec<PriceSample> = rows.into_iter().filter_map(PriceRow::into_sample).collect();
    if samples.len() < total {
        tracing::warn!(skipped = total - samples.len(), "Skipped malformed price rows");
    }
    samples
}

/// Read access to the telemetry database
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Most recent row of `table` by time, or `None` if the table is empty
    async fn fetch_latest_row(&self, table: Table) -> StoreResult<Option<Row>>;

    /// Up to `limit` price rows of `table` ordered by time
    async fn fetch_time_series_window(
        &self,
        table: Table,
        order: SortOrder,
        limit: u32,
    ) -> StoreResult<Vec<PriceRow>>;

    /// Total water usage recorded strictly after `since`; `None` when no rows match
    async fn sum_usage_since(&self, since: EpochSeconds) -> StoreResult<Option<f64>>;
}
