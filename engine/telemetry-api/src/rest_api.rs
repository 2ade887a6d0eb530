//! REST API endpoints for the telemetry service
//!
//! Serves the latest household consumption readings behind a shared key and
//! rate-limited day-ahead electricity price statistics.

use admission_controller::AdmissionController;
use price_statistics::{compute_statistics, parse_margin, Tz};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::auth::ApiKeyGuard;
use crate::config::ServiceConfig;
use crate::error::{ApiError, ConfigError};
use crate::identity::client_identity;
use crate::store::{price_samples, SortOrder, Table, TelemetryStore};
use crate::usage::collect_usage;

/// Body of every status and error reply
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub tracked_clients: usize,
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn TelemetryStore>,
    pub admission: Arc<AdmissionController>,
    pub auth: ApiKeyGuard,
    pub time_zone: Tz,
    pub default_margin: Decimal,
    pub sample_window: u32,
    pub trust_proxy: bool,
}

impl ApiContext {
    pub fn new(
        config: &ServiceConfig,
        store: Arc<dyn TelemetryStore>,
        admission: Arc<AdmissionController>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            store,
            admission,
            auth: ApiKeyGuard::new(config.access.api_key.clone()),
            time_zone: config.time_zone()?,
            default_margin: config.pricing.default_margin,
            sample_window: config.pricing.sample_window,
            trust_proxy: config.server.trust_proxy,
        })
    }
}

fn with_context(ctx: ApiContext) -> impl Filter<Extract = (ApiContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Create REST API routes
pub fn create_routes(
    ctx: ApiContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let trust_proxy = ctx.trust_proxy;
    let context_filter = with_context(ctx);

    // Liveness endpoint
    let root = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::json(&StatusResponse { status: "API online" }));

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(context_filter.clone())
        .map(|ctx: ApiContext| {
            warp::reply::json(&HealthResponse {
                status: "healthy",
                timestamp: chrono::Utc::now().to_rfc3339(),
                tracked_clients: ctx.admission.tracked_identities(),
            })
        });

    // Usage snapshot endpoint
    let data = warp::path("data")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(context_filter.clone())
        .and_then(get_data);

    // Rate limited price statistics endpoint
    let admitted = client_identity(trust_proxy)
        .and(context_filter.clone())
        .and_then(admit)
        .untuple_one();

    let electricity_prices = warp::path("electricity_prices")
        .and(warp::path::end())
        .and(warp::get())
        .and(admitted)
        .and(warp::query::<HashMap<String, String>>())
        .and(context_filter)
        .and_then(get_electricity_prices);

    root.or(health)
        .or(data)
        .or(electricity_prices)
        .recover(handle_rejection)
        .with(
            warp::cors()
                .allow_any_origin()
                .allow_headers(vec!["content-type"])
                .allow_methods(vec!["GET", "OPTIONS"]),
        )
        .with(warp::trace::request())
}

async fn admit(identity: String, ctx: ApiContext) -> Result<(), Rejection> {
    if ctx.admission.try_admit(&identity) {
        Ok(())
    } else {
        debug!(client = %identity, "Rejected price request over rate limit");
        Err(warp::reject::custom(ApiError::TooManyRequests))
    }
}

/// GET /data?key=
async fn get_data(
    params: HashMap<String, String>,
    ctx: ApiContext,
) -> Result<impl Reply, Rejection> {
    ctx.auth.authorize(params.get("key").map(String::as_str)).map_err(warp::reject::custom)?;

    let now = chrono::Utc::now().timestamp();
    let snapshot = collect_usage(ctx.store.as_ref(), now)
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;

    Ok(warp::reply::json(&snapshot))
}

/// GET /electricity_prices?margin=
async fn get_electricity_prices(
    params: HashMap<String, String>,
    ctx: ApiContext,
) -> Result<impl Reply, Rejection> {
    let margin = parse_margin(params.get("margin").map(String::as_str), ctx.default_margin);

    let rows = ctx
        .store
        .fetch_time_series_window(
            Table::ElectricityPrices,
            SortOrder::Descending,
            ctx.sample_window,
        )
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;

    let now = chrono::Utc::now().timestamp();
    let report = compute_statistics(&price_samples(rows), now, margin, ctx.time_zone);
    debug!(
        %margin,
        today = report.today.len(),
        tomorrow = report.tomorrow.len(),
        "Computed price statistics"
    );

    Ok(warp::reply::json(&report))
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, status) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if let Some(api_error) = err.find::<ApiError>() {
        (api_error.status_code(), api_error.public_message())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query")
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(warp::reply::with_status(warp::reply::json(&StatusResponse { status }), code))
}
