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

//! Aggregate senseBox temperature readings from openSenseMap and serve them over HTTP.
//!
//! ## Features
//!
//! Hivebox fetches recent temperature measurements for a configured set of
//! [senseBoxes](https://opensensemap.org/) from the openSenseMap API, averages
//! them, and classifies the average against configurable cold/hot thresholds.
//! The result is served as JSON alongside version, health, and Prometheus
//! metrics endpoints.
//!
//! The following endpoints are exposed:
//!
//! * `GET /` - Service summary and the list of available endpoints.
//! * `GET /version` - Version of the running service.
//! * `GET /health` - Health check.
//! * `GET /temperature` - Average temperature over the last hour across all
//!   configured senseBoxes with a status of `Too Cold`, `Good`, or `Too Hot`.
//!   Responds `503` when no senseBox produced a valid reading.
//! * `GET /metrics` - Request and reading counters in the Prometheus text
//!   exposition format.
//!
//! Every `/temperature` request fetches fresh data, one concurrent upstream
//! request per senseBox bounded by a 10 second timeout. Nothing is cached
//! and failed fetches are never retried, a box without data simply does not
//! contribute to the average.
//!
//! ## Configuration
//!
//! Environment variables override the built-in defaults and are re-read on
//! every request:
//!
//! * `SENSEBOX_IDS` - Comma separated senseBox IDs to aggregate over.
//! * `TEMP_COLD_THRESHOLD` - Averages at or below this are `Too Cold` (default 10).
//! * `TEMP_HOT_THRESHOLD` - Averages at or above this are `Too Hot` (default 37).
//!
//! ## Build
//!
//! `hivebox` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! cargo build --release
//! ```
//!
//! ## Run
//!
//! ```text
//! ./hivebox --bind 0.0.0.0:8000
//! ```
//!
//! Pass `--api-base` to point at a different openSenseMap-compatible API,
//! useful against a local stub.
//!
//! ### Prometheus
//!
//! Metrics are exposed at `/metrics`. Configure scrapes of the service by
//! your Prometheus server under the `scrape_configs` section as described
//! by the example below.
//!
//! ```yaml
//! scrape_configs:
//!   - job_name: hivebox
//!     static_configs:
//!       - targets: ['example:8000']
//! ```
//!

pub mod aggregate;
pub mod client;
pub mod config;
pub mod http;
pub mod metrics;

mod test;
