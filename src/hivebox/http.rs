// Hivebox - Aggregate senseBox temperature readings from openSenseMap
//
// Copyright 2024 Hivebox Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::aggregate::{Aggregation, TemperatureAggregator, TemperatureStatus};
use crate::config::Thresholds;
use crate::metrics::RequestMetrics;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use prometheus_client::encoding::text;
use prometheus_client::registry::Registry;
use serde::Serialize;
use std::sync::Arc;

const TEXT_FORMAT: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Service name reported by the informational endpoints.
pub const SERVICE_NAME: &str = "hivebox";

const UNIT_CELSIUS: &str = "°C";
const UPSTREAM_SOURCE: &str = "openSenseMap";

/// Global state shared between all HTTP requests via Arc.
pub struct RequestState {
    pub registry: Registry,
    pub metrics: RequestMetrics,
    pub aggregator: TemperatureAggregator,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    version: &'static str,
    service: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct TemperatureResponse {
    temperature: f64,
    status: &'static str,
    unit: &'static str,
    source: &'static str,
    sensebox_count: usize,
    thresholds: Thresholds,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct UnavailableResponse {
    error: &'static str,
    temperature: Option<f64>,
    status: &'static str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct InternalErrorResponse {
    error: &'static str,
    message: String,
}

/// Build the routing table over the shared request state. The caller adds
/// any middleware layers it wants on top.
pub fn app(state: Arc<RequestState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/version", get(version_handler))
        .route("/health", get(health_handler))
        .route("/temperature", get(temperature_handler))
        .route("/metrics", get(text_metrics_handler))
        .with_state(state)
}

pub async fn root_handler(State(state): State<Arc<RequestState>>) -> impl IntoResponse {
    state.metrics.incr_request("GET", "/");

    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "status": "running",
        "available_endpoints": ["/version", "/health", "/temperature", "/metrics"],
    }))
}

pub async fn version_handler(State(state): State<Arc<RequestState>>) -> impl IntoResponse {
    state.metrics.incr_request("GET", "/version");

    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        service: SERVICE_NAME,
    })
}

pub async fn health_handler(State(state): State<Arc<RequestState>>) -> impl IntoResponse {
    state.metrics.incr_request("GET", "/health");

    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run one aggregation cycle and report the classified average.
///
/// A cycle with no usable data is an expected condition and maps to a 503
/// with an explicit body. Anything unexpected (a malformed threshold
/// override) maps to a 500 with a short message, detail stays in the log.
pub async fn temperature_handler(State(state): State<Arc<RequestState>>) -> Response {
    state.metrics.incr_request("GET", "/temperature");

    match state.aggregator.average_with_status().await {
        Ok(outcome) => {
            state.metrics.record_readings(outcome.samples());

            match outcome {
                Aggregation::Reading {
                    average,
                    status,
                    thresholds,
                    sensebox_count,
                    ..
                } => Json(TemperatureResponse {
                    temperature: average,
                    status: status.as_label(),
                    unit: UNIT_CELSIUS,
                    source: UPSTREAM_SOURCE,
                    sensebox_count,
                    thresholds,
                    timestamp: Utc::now().to_rfc3339(),
                })
                .into_response(),

                Aggregation::NoData => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(UnavailableResponse {
                        error: "Unable to fetch temperature data",
                        temperature: None,
                        status: TemperatureStatus::Unknown.as_label(),
                        timestamp: Utc::now().to_rfc3339(),
                    }),
                )
                    .into_response(),
            }
        }
        Err(e) => {
            tracing::error!(message = "aggregation failed", error = %e);

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(InternalErrorResponse {
                    error: "Internal server error",
                    message: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Render Prometheus metrics from the registry in the text exposition
/// format. If an error is encountered, an HTTP 500 will be returned and
/// the error will be logged.
pub async fn text_metrics_handler(State(state): State<Arc<RequestState>>) -> Response {
    state.metrics.incr_request("GET", "/metrics");
    let mut buf = Vec::new();

    match text::encode(&mut buf, &state.registry) {
        Ok(_) => {
            tracing::debug!(message = "encoded prometheus metrics to text format");
            (StatusCode::OK, [(CONTENT_TYPE, TEXT_FORMAT)], buf).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics to text format", error = %e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
