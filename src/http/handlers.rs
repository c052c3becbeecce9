//! Breaker route handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admission::Strategy;
use crate::breaker::{BreakerState, CircuitState};
use crate::config::validation::is_valid_key;
use crate::http::response::ApiError;
use crate::http::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PermitQuery {
    pub strategy: Option<String>,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

fn checked_key(key: String) -> Result<String, ApiError> {
    if is_valid_key(&key) {
        Ok(key)
    } else {
        Err(ApiError::BadRequest(format!("invalid breaker key '{}'", key)))
    }
}

pub async fn is_execution_permitted(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<PermitQuery>,
) -> Result<Json<bool>, ApiError> {
    let key = checked_key(key)?;
    let strategy = match query.strategy.as_deref() {
        Some(raw) => raw.parse::<Strategy>()?,
        None => Strategy::default(),
    };

    let permitted = state.decider.is_execution_permitted(&key, strategy).await?;
    Ok(Json(permitted))
}

pub async fn record_success(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CircuitState>, ApiError> {
    let key = checked_key(key)?;
    Ok(Json(state.decider.record_success(&key).await?))
}

pub async fn record_failure(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CircuitState>, ApiError> {
    let key = checked_key(key)?;
    Ok(Json(state.decider.record_failure(&key).await?))
}

pub async fn circuit_state(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CircuitState>, ApiError> {
    let key = checked_key(key)?;
    Ok(Json(state.decider.get_circuit_state(&key).await?))
}

pub async fn breaker_state(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Option<BreakerState>>, ApiError> {
    let key = checked_key(key)?;
    Ok(Json(state.decider.get_breaker_state(&key).await?))
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
