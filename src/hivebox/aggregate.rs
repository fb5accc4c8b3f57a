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

use crate::client::TemperatureSource;
use crate::config::{Config, ConfigError, Thresholds};
use futures_util::future;

/// Trailing window measurements are fetched over, in hours.
pub const DEFAULT_WINDOW_HOURS: i64 = 1;

/// Lower bound of the plausible ambient temperature range, in celsius.
/// Values outside the range are discarded as sensor glitches.
pub const MIN_PLAUSIBLE_CELSIUS: f64 = -50.0;

/// Upper bound of the plausible ambient temperature range, in celsius.
pub const MAX_PLAUSIBLE_CELSIUS: f64 = 60.0;

/// Classification of an averaged temperature against the configured
/// thresholds. `Unknown` is used exactly when there is no average.
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum TemperatureStatus {
    TooCold,
    Good,
    TooHot,
    Unknown,
}

impl TemperatureStatus {
    /// Classify an average against a threshold pair. Both bounds are
    /// inclusive and the cold bound is checked first, so with a reversed
    /// pair (cold above hot) the cold check wins for overlapping values.
    pub fn classify(average: f64, thresholds: Thresholds) -> Self {
        if average <= thresholds.cold {
            TemperatureStatus::TooCold
        } else if average >= thresholds.hot {
            TemperatureStatus::TooHot
        } else {
            TemperatureStatus::Good
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            TemperatureStatus::TooCold => "Too Cold",
            TemperatureStatus::Good => "Good",
            TemperatureStatus::TooHot => "Too Hot",
            TemperatureStatus::Unknown => "Unknown",
        }
    }
}

/// Outcome of one aggregation cycle.
///
/// `NoData` means not a single configured senseBox produced a valid
/// measurement, there is nothing to report and nothing was guessed.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Reading {
        /// Mean of all valid measurements, rounded to two decimal places.
        average: f64,
        status: TemperatureStatus,
        /// Threshold pair the average was classified against.
        thresholds: Thresholds,
        /// Number of configured senseBoxes, including ones that yielded nothing.
        sensebox_count: usize,
        /// Number of measurements that survived validation.
        samples: usize,
    },
    NoData,
}

impl Aggregation {
    /// Number of validated measurements behind this outcome.
    pub fn samples(&self) -> usize {
        match self {
            Aggregation::Reading { samples, .. } => *samples,
            Aggregation::NoData => 0,
        }
    }
}

/// Compute a single classified ambient temperature from the measurements
/// of all configured senseBoxes.
///
/// Boxes are fetched concurrently, one in-flight request per box, and a box
/// that fails or reports nothing valid simply contributes no samples. The
/// senseBox list and thresholds are re-read from the configuration on every
/// cycle so environment overrides take effect without a restart.
pub struct TemperatureAggregator {
    source: Box<dyn TemperatureSource + Send + Sync>,
    config: Config,
    window_hours: i64,
}

impl TemperatureAggregator {
    pub fn new<T>(source: T, config: Config, window_hours: i64) -> Self
    where
        T: TemperatureSource + Send + Sync + 'static,
    {
        Self {
            source: Box::new(source),
            config,
            window_hours,
        }
    }

    /// Mean of all valid measurements across all configured senseBoxes over
    /// the trailing window, rounded to two decimal places, or `None` if no
    /// box produced a valid measurement.
    pub async fn average(&self) -> Option<f64> {
        let ids = self.config.sensebox_ids();
        mean(&self.collect(&ids).await)
    }

    /// Like [`average`](Self::average) but classified against the current
    /// thresholds. Thresholds are only consulted when an average exists, a
    /// missing average is always `NoData` regardless of configuration.
    pub async fn average_with_status(&self) -> Result<Aggregation, ConfigError> {
        let ids = self.config.sensebox_ids();
        let samples = self.collect(&ids).await;

        let average = match mean(&samples) {
            Some(average) => average,
            None => return Ok(Aggregation::NoData),
        };

        let thresholds = self.config.thresholds()?;
        Ok(Aggregation::Reading {
            average,
            status: TemperatureStatus::classify(average, thresholds),
            thresholds,
            sensebox_count: ids.len(),
            samples: samples.len(),
        })
    }

    /// Fetch all boxes concurrently and pool the values that parse as
    /// floats within the plausible range. Invalid values are dropped one by
    /// one, a failed box drops out as a whole.
    async fn collect(&self, sensebox_ids: &[String]) -> Vec<f64> {
        let fetches = sensebox_ids.iter().map(|id| async move {
            (id, self.source.temperature_measurements(id, self.window_hours).await)
        });

        let mut pool = Vec::new();
        for (id, result) in future::join_all(fetches).await {
            match result {
                Ok(measurements) => {
                    tracing::debug!(
                        message = "fetched measurements",
                        sensebox = %id,
                        count = measurements.len(),
                    );

                    pool.extend(measurements.iter().filter_map(|m| validate(id, m.value.as_f64())));
                }
                Err(e) => {
                    tracing::warn!(message = "no data from senseBox", sensebox = %id, error = %e);
                }
            }
        }

        pool
    }
}

fn validate(sensebox_id: &str, value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if (MIN_PLAUSIBLE_CELSIUS..=MAX_PLAUSIBLE_CELSIUS).contains(&v) => Some(v),
        Some(v) => {
            tracing::debug!(
                message = "discarding implausible measurement",
                sensebox = %sensebox_id,
                value = v,
            );
            None
        }
        None => {
            tracing::debug!(message = "discarding unparseable measurement", sensebox = %sensebox_id);
            None
        }
    }
}

fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    Some(round_to_2(mean))
}

fn round_to_2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod test {
    use super::{
        mean, round_to_2, Aggregation, TemperatureAggregator, TemperatureStatus,
        DEFAULT_WINDOW_HOURS,
    };
    use crate::config::{Config, Thresholds};
    use crate::test::MockSource;

    fn config_for(ids: &[&str]) -> Config {
        Config::with_defaults(
            ids.iter().map(|s| s.to_string()).collect(),
            Thresholds { cold: 10.0, hot: 37.0 },
        )
    }

    fn aggregator(source: MockSource, config: Config) -> TemperatureAggregator {
        TemperatureAggregator::new(source, config, DEFAULT_WINDOW_HOURS)
    }

    #[test]
    fn test_classify_good() {
        let thresholds = Thresholds { cold: 10.0, hot: 37.0 };

        assert_eq!(
            TemperatureStatus::Good,
            TemperatureStatus::classify(23.0, thresholds)
        );
    }

    #[test]
    fn test_classify_cold_bound_inclusive() {
        let thresholds = Thresholds { cold: 10.0, hot: 37.0 };

        assert_eq!(
            TemperatureStatus::TooCold,
            TemperatureStatus::classify(10.0, thresholds)
        );
        assert_eq!(
            TemperatureStatus::TooCold,
            TemperatureStatus::classify(-12.4, thresholds)
        );
    }

    #[test]
    fn test_classify_hot_bound_inclusive() {
        let thresholds = Thresholds { cold: 10.0, hot: 37.0 };

        assert_eq!(
            TemperatureStatus::TooHot,
            TemperatureStatus::classify(37.0, thresholds)
        );
        assert_eq!(
            TemperatureStatus::TooHot,
            TemperatureStatus::classify(45.0, thresholds)
        );
    }

    #[test]
    fn test_classify_reversed_thresholds_cold_wins() {
        // A reversed pair is used verbatim, the cold check runs first
        let thresholds = Thresholds { cold: 37.0, hot: 10.0 };

        assert_eq!(
            TemperatureStatus::TooCold,
            TemperatureStatus::classify(20.0, thresholds)
        );
    }

    #[test]
    fn test_mean_empty() {
        assert_eq!(None, mean(&[]));
    }

    #[test]
    fn test_mean_rounds_to_two_places() {
        assert_eq!(Some(20.33), mean(&[20.0, 20.0, 21.0]));
        assert_eq!(Some(22.15), mean(&[22.1, 22.2]));
    }

    #[test]
    fn test_round_to_2() {
        assert_eq!(23.46, round_to_2(23.456));
        assert_eq!(23.0, round_to_2(23.0));
        assert_eq!(-10.13, round_to_2(-10.125));
    }

    #[tokio::test]
    async fn test_average_all_boxes_reporting() {
        let source = MockSource::new()
            .with_numbers("box-a", &[21.0])
            .with_numbers("box-b", &[23.0])
            .with_numbers("box-c", &[25.0]);
        let agg = aggregator(source, config_for(&["box-a", "box-b", "box-c"]));

        assert_eq!(Some(23.0), agg.average().await);
    }

    #[tokio::test]
    async fn test_average_with_status_all_boxes_reporting() {
        let source = MockSource::new()
            .with_numbers("box-a", &[21.0])
            .with_numbers("box-b", &[23.0])
            .with_numbers("box-c", &[25.0]);
        let agg = aggregator(source, config_for(&["box-a", "box-b", "box-c"]));

        let outcome = agg.average_with_status().await.unwrap();
        assert_eq!(
            Aggregation::Reading {
                average: 23.0,
                status: TemperatureStatus::Good,
                thresholds: Thresholds { cold: 10.0, hot: 37.0 },
                sensebox_count: 3,
                samples: 3,
            },
            outcome
        );
    }

    #[tokio::test]
    async fn test_average_discards_invalid_values() {
        let source = MockSource::new()
            .with_numbers("box-a", &[15.0, 200.0, -100.0])
            .with_texts("box-a", &["not-a-number"]);
        let agg = aggregator(source, config_for(&["box-a"]));

        let outcome = agg.average_with_status().await.unwrap();
        assert_eq!(
            Aggregation::Reading {
                average: 15.0,
                status: TemperatureStatus::Good,
                thresholds: Thresholds { cold: 10.0, hot: 37.0 },
                sensebox_count: 1,
                samples: 1,
            },
            outcome
        );
    }

    #[tokio::test]
    async fn test_average_range_bounds_inclusive() {
        let source = MockSource::new().with_numbers("box-a", &[-50.0, 60.0, -50.01, 60.01]);
        let agg = aggregator(source, config_for(&["box-a"]));

        // Only the exact bounds survive, their mean is 5.0
        assert_eq!(Some(5.0), agg.average().await);
    }

    #[tokio::test]
    async fn test_average_textual_values_parse() {
        let source = MockSource::new().with_texts("box-a", &["21.3", "22.7"]);
        let agg = aggregator(source, config_for(&["box-a"]));

        assert_eq!(Some(22.0), agg.average().await);
    }

    #[tokio::test]
    async fn test_average_no_boxes_reporting() {
        let source = MockSource::new();
        let agg = aggregator(source, config_for(&["box-a", "box-b"]));

        assert_eq!(None, agg.average().await);
        assert_eq!(Aggregation::NoData, agg.average_with_status().await.unwrap());
    }

    #[tokio::test]
    async fn test_average_all_boxes_failing() {
        let source = MockSource::new().with_failure("box-a").with_failure("box-b");
        let agg = aggregator(source, config_for(&["box-a", "box-b"]));

        assert_eq!(Aggregation::NoData, agg.average_with_status().await.unwrap());
    }

    #[tokio::test]
    async fn test_average_failing_box_does_not_abort_others() {
        let source = MockSource::new()
            .with_failure("box-a")
            .with_numbers("box-b", &[20.0]);
        let agg = aggregator(source, config_for(&["box-a", "box-b"]));

        let outcome = agg.average_with_status().await.unwrap();
        assert_eq!(
            Aggregation::Reading {
                average: 20.0,
                status: TemperatureStatus::Good,
                thresholds: Thresholds { cold: 10.0, hot: 37.0 },
                sensebox_count: 2,
                samples: 1,
            },
            outcome
        );
    }

    #[tokio::test]
    async fn test_average_with_status_cold_boundary() {
        let source = MockSource::new().with_numbers("box-a", &[10.0]);
        let agg = aggregator(source, config_for(&["box-a"]));

        let outcome = agg.average_with_status().await.unwrap();
        match outcome {
            Aggregation::Reading { average, status, .. } => {
                assert_eq!(10.0, average);
                assert_eq!(TemperatureStatus::TooCold, status);
            }
            Aggregation::NoData => panic!("expected a reading"),
        }
    }

    #[tokio::test]
    async fn test_average_with_status_idempotent() {
        let source = MockSource::new()
            .with_numbers("box-a", &[18.5])
            .with_numbers("box-b", &[21.5]);
        let agg = aggregator(source, config_for(&["box-a", "box-b"]));

        let first = agg.average_with_status().await.unwrap();
        let second = agg.average_with_status().await.unwrap();

        assert_eq!(first, second);
    }
}
