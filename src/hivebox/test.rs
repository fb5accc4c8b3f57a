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

#![cfg(test)]

use crate::client::{ClientError, ClientErrorKind, Measurement, MeasurementValue, TemperatureSource};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// TemperatureSource implementation backed by canned per-box measurements.
/// Boxes marked as failing return a transport error, boxes never mentioned
/// return an empty measurement list.
#[derive(Debug, Default)]
pub(crate) struct MockSource {
    responses: HashMap<String, Vec<Measurement>>,
    failures: HashSet<String>,
}

impl MockSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_numbers(mut self, sensebox_id: &str, values: &[f64]) -> Self {
        let measurements = self.responses.entry(sensebox_id.to_string()).or_default();
        measurements.extend(values.iter().map(|v| Measurement {
            value: MeasurementValue::Number(*v),
        }));
        self
    }

    pub(crate) fn with_texts(mut self, sensebox_id: &str, values: &[&str]) -> Self {
        let measurements = self.responses.entry(sensebox_id.to_string()).or_default();
        measurements.extend(values.iter().map(|v| Measurement {
            value: MeasurementValue::Text(v.to_string()),
        }));
        self
    }

    pub(crate) fn with_failure(mut self, sensebox_id: &str) -> Self {
        self.failures.insert(sensebox_id.to_string());
        self
    }
}

#[async_trait]
impl TemperatureSource for MockSource {
    async fn temperature_measurements(
        &self,
        sensebox_id: &str,
        _window_hours: i64,
    ) -> Result<Vec<Measurement>, ClientError> {
        if self.failures.contains(sensebox_id) {
            return Err(ClientError::KindMsg(
                ClientErrorKind::Transport,
                "simulated network failure",
            ));
        }

        Ok(self.responses.get(sensebox_id).cloned().unwrap_or_default())
    }
}
