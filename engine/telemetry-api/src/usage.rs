//! Latest consumption readings for the usage endpoint

use price_statistics::{EpochSeconds, SECONDS_PER_DAY};
use serde::Serialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::store::{Row, Table, TelemetryStore};

/// Span of the short-term water usage total
pub const RECENT_USAGE_WINDOW_SECS: i64 = 10 * 60;

/// Latest electricity and water readings plus water totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    /// Time of the latest water reading
    pub time: Value,
    pub electricity: Row,
    pub water: Row,
}

/// Start of the UTC day containing `now`
pub fn utc_day_start(now: EpochSeconds) -> EpochSeconds {
    now - now.rem_euclid(SECONDS_PER_DAY)
}

/// Assemble the usage snapshot at `now`
pub async fn collect_usage(
    store: &dyn TelemetryStore,
    now: EpochSeconds,
) -> StoreResult<UsageSnapshot> {
    let mut electricity = store
        .fetch_latest_row(Table::Electricity)
        .await?
        .ok_or(StoreError::Empty(Table::Electricity.name()))?;
    let mut water =
        store.fetch_latest_row(Table::Water).await?.ok_or(StoreError::Empty(Table::Water.name()))?;

    let daily = store.sum_usage_since(utc_day_start(now)).await?;
    let ten_min = store.sum_usage_since(now - RECENT_USAGE_WINDOW_SECS).await?;

    let time = water.remove("time").unwrap_or(Value::Null);
    electricity.remove("time");
    water.insert("daily".to_string(), daily.into());
    water.insert("tenMin".to_string(), ten_min.into());

    Ok(UsageSnapshot { time, electricity, water })
}
