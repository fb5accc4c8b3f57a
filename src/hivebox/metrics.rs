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

use prometheus_client::encoding::text::Encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, Hash, PartialEq, Eq, Encode)]
struct RequestLabels {
    method: String,
    endpoint: String,
}

/// Counters kept by the service boundary: served requests by method and
/// endpoint, and the total number of temperature readings that made it
/// into an average. Owned by whoever constructs them and handed to the
/// HTTP layer, the aggregation core never sees these.
pub struct RequestMetrics {
    requests: Family<RequestLabels, Counter>,
    readings: Counter,
}

impl RequestMetrics {
    pub fn new(reg: &mut Registry) -> Self {
        let requests = Family::<RequestLabels, Counter>::default();
        let readings = Counter::default();

        reg.register(
            "hivebox_requests",
            "Number of HTTP requests by method and endpoint",
            Box::new(requests.clone()),
        );
        reg.register(
            "hivebox_temperature_readings",
            "Number of temperature readings recorded",
            Box::new(readings.clone()),
        );

        Self { requests, readings }
    }

    pub fn incr_request(&self, method: &str, endpoint: &str) {
        let labels = RequestLabels {
            method: method.to_owned(),
            endpoint: endpoint.to_owned(),
        };

        self.requests.get_or_create(&labels).inc();
    }

    pub fn record_readings(&self, count: usize) {
        self.readings.inc_by(count as u64);
    }
}
