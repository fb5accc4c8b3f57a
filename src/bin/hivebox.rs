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

use clap::Parser;
use hivebox::aggregate::{TemperatureAggregator, DEFAULT_WINDOW_HOURS};
use hivebox::client::{OsmClient, DEFAULT_API_BASE};
use hivebox::config::Config;
use hivebox::http::RequestState;
use hivebox::metrics::RequestMetrics;
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::{io, process};
use tokio::signal::unix::{self, SignalKind};
use tower_http::trace::TraceLayer;
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 8000);

/// Serve averaged senseBox temperature readings from openSenseMap
///
/// Fetch recent temperature measurements for a set of senseBoxes from the
/// openSenseMap API, average them over a trailing window, and classify the
/// average against configurable cold/hot thresholds. The classified reading
/// is served as JSON alongside version, health, and Prometheus metrics
/// endpoints.
///
/// The senseBox list and the thresholds can be overridden through the
/// SENSEBOX_IDS, TEMP_COLD_THRESHOLD, and TEMP_HOT_THRESHOLD environment
/// variables. Overrides are re-read on every request, no restart needed.
#[derive(Debug, Parser)]
#[clap(name = "hivebox", version = clap::crate_version ! ())]
struct HiveboxApplication {
    /// Base URL of the openSenseMap API
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Trailing window measurements are fetched over, in hours
    #[arg(long, default_value_t = DEFAULT_WINDOW_HOURS)]
    window_hours: i64,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[arg(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Address to bind to. By default, hivebox will bind to a public address
    /// since the endpoints are meant to be consumed by external systems
    /// (Prometheus or anything speaking HTTP)
    #[arg(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let opts = HiveboxApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let client = OsmClient::new(&opts.api_base).unwrap_or_else(|e| {
        tracing::error!(message = "failed to initialize openSenseMap client", api_base = %opts.api_base, error = %e);
        process::exit(1)
    });

    let mut registry = <Registry>::default();
    let metrics = RequestMetrics::new(&mut registry);
    let aggregator = TemperatureAggregator::new(client, Config::default(), opts.window_hours);

    let state = Arc::new(RequestState {
        registry,
        metrics,
        aggregator,
    });
    let app = hivebox::http::app(state).layer(TraceLayer::new_for_http());

    let server = axum::Server::try_bind(&opts.bind)
        .map(|s| {
            s.serve(app.into_make_service()).with_graceful_shutdown(async {
                // Wait for either SIGTERM or SIGINT to shutdown
                tokio::select! {
                    _ = sigterm() => {}
                    _ = sigint() => {}
                }
            })
        })
        .unwrap_or_else(|e| {
            tracing::error!(message = "error starting server", address = %opts.bind, err = %e);
            process::exit(1)
        });

    tracing::info!(
        message = "starting server",
        address = %opts.bind,
        api_base = %opts.api_base,
        window_hours = opts.window_hours,
    );
    server.await.unwrap();

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
