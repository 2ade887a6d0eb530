//! MariaDB / MySQL backed telemetry store

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use price_statistics::EpochSeconds;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{Column, Row as _, TypeInfo};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{PriceRow, Row, SortOrder, Table, TelemetryStore};

/// Telemetry store over a pooled MySQL connection
#[derive(Clone)]
pub struct MySqlTelemetryStore {
    pool: MySqlPool,
}

impl MySqlTelemetryStore {
    /// Build the pool without connecting; connections open on first use
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy_with(options);

        info!(
            "Database pool configured for {}:{}/{} (max {} connections)",
            config.host, config.port, config.database, config.max_connections
        );

        Self { pool }
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }

    async fn acquire(&self) -> StoreResult<PoolConnection<MySql>> {
        self.pool.acquire().await.map_err(|e| {
            error!("Failed to acquire database connection: {}", e);
            StoreError::Connection(e)
        })
    }
}

#[async_trait]
impl TelemetryStore for MySqlTelemetryStore {
    async fn fetch_latest_row(&self, table: Table) -> StoreResult<Option<Row>> {
        let mut conn = self.acquire().await?;
        let sql = format!("SELECT * FROM {} ORDER BY time DESC LIMIT 1", table.name());

        let row = sqlx::query(&sql).fetch_optional(&mut *conn).await.map_err(|e| {
            error!("Failed to fetch latest {} row: {}", table.name(), e);
            StoreError::Query(e)
        })?;

        Ok(row.as_ref().map(row_to_json))
    }

    async fn fetch_time_series_window(
        &self,
        table: Table,
        order: SortOrder,
        limit: u32,
    ) -> StoreResult<Vec<PriceRow>> {
        let mut conn = self.acquire().await?;
        let sql = format!(
            "SELECT CAST(time AS SIGNED) AS time, \
                    CAST(price AS DECIMAL(20, 6)) AS price, \
                    CAST(alv AS DECIMAL(10, 6)) AS alv \
             FROM {} ORDER BY time {} LIMIT ?",
            table.name(),
            order.sql()
        );

        let rows = sqlx::query(&sql).bind(limit).fetch_all(&mut *conn).await.map_err(|e| {
            error!("Failed to fetch {} time series: {}", table.name(), e);
            StoreError::Query(e)
        })?;

        let prices = rows
            .iter()
            .map(|row| -> Result<PriceRow, sqlx::Error> {
                Ok(PriceRow {
                    time: row.try_get("time")?,
                    price: row.try_get("price")?,
                    alv: row.try_get("alv")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                error!("Failed to decode {} row: {}", table.name(), e);
                StoreError::Query(e)
            })?;

        debug!("Fetched {} price rows", prices.len());
        Ok(prices)
    }

    async fn sum_usage_since(&self, since: EpochSeconds) -> StoreResult<Option<f64>> {
        let mut conn = self.acquire().await?;
        let sql =
            format!("SELECT SUM(waterUsage) AS total FROM {} WHERE time > ?", Table::Water.name());

        let row = sqlx::query(&sql).bind(since).fetch_one(&mut *conn).await.map_err(|e| {
            error!("Failed to sum water usage since {}: {}", since, e);
            StoreError::Query(e)
        })?;

        Ok(column_value(&row, 0).as_f64())
    }
}

/// Convert a row of any shape into a JSON object keyed by column name
fn row_to_json(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), column_value(row, column.ordinal())))
        .collect()
}

fn column_value(row: &MySqlRow, index: usize) -> Value {
    let type_name = row.columns()[index].type_info().name().to_ascii_uppercase();

    let value = match type_name.as_str() {
        "NULL" => Some(None),
        "BOOLEAN" => decode::<bool>(row, index).map(|v| v.map(Value::from)),
        name if name.ends_with("UNSIGNED") => decode::<u64>(row, index).map(|v| v.map(Value::from)),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            decode::<i64>(row, index).map(|v| v.map(Value::from))
        }
        "FLOAT" | "DOUBLE" => {
            decode::<f64>(row, index).map(|v| v.and_then(Number::from_f64).map(Value::Number))
        }
        "DECIMAL" => decode::<Decimal>(row, index)
            .map(|v| v.and_then(|d| d.to_f64()).and_then(Number::from_f64).map(Value::Number)),
        "DATETIME" => decode::<NaiveDateTime>(row, index).map(|v| v.map(|t| Value::String(t.to_string()))),
        "TIMESTAMP" => {
            decode::<DateTime<Utc>>(row, index).map(|v| v.map(|t| Value::String(t.to_rfc3339())))
        }
        "DATE" => decode::<NaiveDate>(row, index).map(|v| v.map(|d| Value::String(d.to_string()))),
        _ => decode::<String>(row, index).map(|v| v.map(Value::from)),
    };

    value.flatten().unwrap_or(Value::Null)
}

fn decode<'r, T>(row: &'r MySqlRow, index: usize) -> Option<Option<T>>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Could not decode column {}: {}", index, e);
            None
        }
    }
}
