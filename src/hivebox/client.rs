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

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{self, Formatter};
use std::time::Duration;

/// Base URL of the public openSenseMap API.
pub const DEFAULT_API_BASE: &str = "https://api.opensensemap.org";

/// Sensor titles recognized as temperature channels, compared case-insensitively.
const TEMPERATURE_TITLES: [&str; 3] = ["temperature", "temperatur", "temp"];

/// Per-request timeout for upstream calls. Requests that run longer are
/// treated the same as any other upstream failure.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Metadata for a single senseBox as returned by `GET /boxes/{id}`.
///
/// Only the fields needed to locate a temperature sensor are kept, the
/// upstream payload carries much more.
#[derive(Debug, Clone, Deserialize)]
pub struct SenseBox {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

/// One measurement channel of a senseBox.
#[derive(Debug, Clone, Deserialize)]
pub struct Sensor {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub unit: Option<String>,
}

/// A single observation from a sensor measurement channel.
#[derive(Debug, Clone, Deserialize)]
pub struct Measurement {
    pub value: MeasurementValue,
}

/// Raw measurement value as received from the API.
///
/// The API emits values as JSON strings but numbers show up as well, so
/// both forms are accepted and parsing to a float is an explicit step the
/// caller decides how to handle.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Text(String),
}

impl MeasurementValue {
    /// The value as a float, or `None` if it does not parse as one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MeasurementValue::Number(v) => Some(*v),
            MeasurementValue::Text(raw) => raw.trim().parse().ok(),
        }
    }
}

/// Potential kinds of errors that can be encountered talking to the API
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum ClientErrorKind {
    Initialization,
    Transport,
    Status,
    Body,
}

impl ClientErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientErrorKind::Initialization => "initialization",
            ClientErrorKind::Transport => "transport",
            ClientErrorKind::Status => "status",
            ClientErrorKind::Body => "body",
        }
    }
}

/// Error initializing the client or fetching data from the upstream API
#[derive(Debug)]
pub enum ClientError {
    Status(StatusCode),
    KindMsg(ClientErrorKind, &'static str),
    KindMsgCause(ClientErrorKind, &'static str, Box<dyn Error + Send + Sync>),
}

impl ClientError {
    pub fn kind(&self) -> ClientErrorKind {
        match self {
            ClientError::Status(_) => ClientErrorKind::Status,
            ClientError::KindMsg(kind, _) => *kind,
            ClientError::KindMsgCause(kind, _, _) => *kind,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Status(code) => write!(f, "unexpected response status: {}", code),
            ClientError::KindMsg(_, msg) => msg.fmt(f),
            ClientError::KindMsgCause(_, msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientError::KindMsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Source of temperature measurements for a single senseBox.
///
/// Abstraction over the openSenseMap API to allow for easier testing.
#[async_trait]
pub trait TemperatureSource {
    /// Fetch the temperature measurements a senseBox recorded over the
    /// trailing window, oldest first as returned by the API.
    ///
    /// An empty list means the box exists but has no temperature sensor or
    /// recorded nothing in the window. An error means the box yielded no
    /// usable data at all for this cycle.
    async fn temperature_measurements(
        &self,
        sensebox_id: &str,
        window_hours: i64,
    ) -> Result<Vec<Measurement>, ClientError>;
}

/// Client for the openSenseMap HTTP API.
///
/// All calls are bounded by a fixed timeout and are never retried. Failures
/// are returned to the caller which decides whether a box without data is a
/// problem, nothing is raised past that boundary.
#[derive(Debug, Clone)]
pub struct OsmClient {
    http: reqwest::Client,
    api_base: String,
}

impl OsmClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(api_base, FETCH_TIMEOUT)
    }

    /// Create a client with a non-default per-request timeout, mostly
    /// useful to keep tests fast.
    pub fn with_timeout(api_base: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            ClientError::KindMsgCause(
                ClientErrorKind::Initialization,
                "unable to build HTTP client",
                Box::new(e),
            )
        })?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch metadata for a single senseBox, including its sensor list.
    pub async fn sensebox(&self, sensebox_id: &str) -> Result<SenseBox, ClientError> {
        let url = format!("{}/boxes/{}", self.api_base, sensebox_id);
        let res = self.http.get(&url).send().await.map_err(|e| {
            ClientError::KindMsgCause(
                ClientErrorKind::Transport,
                "request for senseBox metadata failed",
                Box::new(e),
            )
        })?;

        if !res.status().is_success() {
            return Err(ClientError::Status(res.status()));
        }

        res.json().await.map_err(|e| {
            ClientError::KindMsgCause(
                ClientErrorKind::Body,
                "malformed senseBox metadata payload",
                Box::new(e),
            )
        })
    }
}

#[async_trait]
impl TemperatureSource for OsmClient {
    async fn temperature_measurements(
        &self,
        sensebox_id: &str,
        window_hours: i64,
    ) -> Result<Vec<Measurement>, ClientError> {
        let sensebox = self.sensebox(sensebox_id).await?;
        let sensor = match find_temperature_sensor(&sensebox.sensors) {
            Some(sensor) => sensor,
            None => {
                tracing::debug!(
                    message = "senseBox has no temperature sensor",
                    sensebox = %sensebox_id,
                );
                return Ok(Vec::new());
            }
        };

        let from_date = (Utc::now() - ChronoDuration::hours(window_hours)).to_rfc3339();
        let url = format!(
            "{}/boxes/{}/sensors/{}/measurements",
            self.api_base, sensebox_id, sensor.id
        );

        let res = self
            .http
            .get(&url)
            .query(&[("from-date", from_date.as_str())])
            .send()
            .await
            .map_err(|e| {
                ClientError::KindMsgCause(
                    ClientErrorKind::Transport,
                    "request for sensor measurements failed",
                    Box::new(e),
                )
            })?;

        if !res.status().is_success() {
            return Err(ClientError::Status(res.status()));
        }

        res.json().await.map_err(|e| {
            ClientError::KindMsgCause(
                ClientErrorKind::Body,
                "malformed measurements payload",
                Box::new(e),
            )
        })
    }
}

/// Pick the first sensor whose title names a temperature channel, matching
/// case-insensitively against a small vocabulary ("temperature",
/// "temperatur", "temp"). Sensors are scanned in the order the API listed
/// them.
pub fn find_temperature_sensor(sensors: &[Sensor]) -> Option<&Sensor> {
    sensors
        .iter()
        .find(|s| TEMPERATURE_TITLES.contains(&s.title.to_lowercase().as_str()))
}
