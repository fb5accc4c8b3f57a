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

use serde::Serialize;
use std::env;
use std::error::Error;
use std::fmt::{self, Formatter};
use std::num::ParseFloatError;

/// Environment variable holding a comma separated list of senseBox IDs.
pub const SENSEBOX_IDS_VAR: &str = "SENSEBOX_IDS";

/// Environment variable overriding the "Too Cold" threshold, in celsius.
pub const COLD_THRESHOLD_VAR: &str = "TEMP_COLD_THRESHOLD";

/// Environment variable overriding the "Too Hot" threshold, in celsius.
pub const HOT_THRESHOLD_VAR: &str = "TEMP_HOT_THRESHOLD";

const DEFAULT_SENSEBOX_IDS: [&str; 3] = [
    "5eba5fbad46fb8001b799786",
    "5c21ff8f919bf8001adf2488",
    "5ade1acf223bd80019a1011c",
];

const DEFAULT_COLD_THRESHOLD: f64 = 10.0;
const DEFAULT_HOT_THRESHOLD: f64 = 37.0;

/// Pair of temperature bounds an averaged reading is classified against.
///
/// Both bounds are inclusive. The relative ordering of the two values is
/// not validated anywhere, a reversed pair is used as-is.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Thresholds {
    pub cold: f64,
    pub hot: f64,
}

/// Error reading overrides from the process environment.
#[derive(Debug)]
pub enum ConfigError {
    Threshold(&'static str, ParseFloatError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Threshold(var, e) => {
                write!(f, "invalid threshold in {}: {}", var, e)
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Threshold(_, ref e) => Some(e),
        }
    }
}

/// Source of the senseBox ID list and classification thresholds.
///
/// Defaults are fixed at construction time while environment overrides are
/// consulted on every call. Overrides may change between two aggregation
/// cycles of a running process and the most recent values win, nothing is
/// cached here.
#[derive(Debug, Clone)]
pub struct Config {
    default_sensebox_ids: Vec<String>,
    default_thresholds: Thresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_sensebox_ids: DEFAULT_SENSEBOX_IDS.iter().map(|s| s.to_string()).collect(),
            default_thresholds: Thresholds {
                cold: DEFAULT_COLD_THRESHOLD,
                hot: DEFAULT_HOT_THRESHOLD,
            },
        }
    }
}

impl Config {
    /// Create a configuration with the given fallbacks instead of the
    /// built-in senseBox IDs and thresholds. Environment overrides still
    /// take precedence.
    pub fn with_defaults(sensebox_ids: Vec<String>, thresholds: Thresholds) -> Self {
        Self {
            default_sensebox_ids: sensebox_ids,
            default_thresholds: thresholds,
        }
    }

    /// IDs of the senseBoxes readings are aggregated over.
    ///
    /// A non-empty `SENSEBOX_IDS` value replaces the defaults entirely.
    /// Entries are trimmed of surrounding whitespace and entries that trim
    /// to nothing are dropped since they cannot form a valid URL.
    pub fn sensebox_ids(&self) -> Vec<String> {
        match env::var(SENSEBOX_IDS_VAR) {
            Ok(raw) if !raw.trim().is_empty() => parse_sensebox_ids(&raw),
            _ => self.default_sensebox_ids.clone(),
        }
    }

    /// Current threshold pair, either variable overridden independently.
    ///
    /// An override that is present but does not parse as a float is an
    /// error for the caller to surface, not a silent fallback.
    pub fn thresholds(&self) -> Result<Thresholds, ConfigError> {
        let cold = match env::var(COLD_THRESHOLD_VAR) {
            Ok(raw) => parse_threshold(COLD_THRESHOLD_VAR, &raw)?,
            Err(_) => self.default_thresholds.cold,
        };

        let hot = match env::var(HOT_THRESHOLD_VAR) {
            Ok(raw) => parse_threshold(HOT_THRESHOLD_VAR, &raw)?,
            Err(_) => self.default_thresholds.hot,
        };

        Ok(Thresholds { cold, hot })
    }
}

fn parse_sensebox_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
        .collect()
}

fn parse_threshold(var: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim().parse().map_err(|e| ConfigError::Threshold(var, e))
}
