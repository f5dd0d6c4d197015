//! ARGO float and profile models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operational state of a float
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatStatus {
    #[default]
    Active,
    Maintenance,
    Inactive,
}

impl fmt::Display for FloatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatStatus::Active => write!(f, "active"),
            FloatStatus::Maintenance => write!(f, "maintenance"),
            FloatStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for FloatStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(FloatStatus::Active),
            "maintenance" => Ok(FloatStatus::Maintenance),
            "inactive" => Ok(FloatStatus::Inactive),
            _ => Err(anyhow::anyhow!("Invalid float status: {}", s)),
        }
    }
}

/// An ARGO float as listed on the dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgoFloat {
    /// WMO identifier, e.g. "2901623"
    pub float_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: FloatStatus,
    /// Latest surface temperature, °C
    pub temperature: Option<f64>,
    /// Latest surface salinity, PSU
    pub salinity: Option<f64>,
    pub region: Option<String>,
    /// Battery level, percent
    pub battery_level: i64,
    pub data_quality: String,
    pub deployment_date: Option<NaiveDate>,
    pub last_profile: Option<NaiveDate>,
}

impl ArgoFloat {
    pub fn is_active(&self) -> bool {
        self.status == FloatStatus::Active
    }

    /// Whether the float lies inside the given box (inclusive edges)
    pub fn within(&self, bounds: &GeoBounds) -> bool {
        bounds.contains(self.latitude, self.longitude)
    }
}

/// Input for registering a new float
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFloatInput {
    pub float_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub status: FloatStatus,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_battery_level")]
    pub battery_level: i64,
    #[serde(default = "default_data_quality")]
    pub data_quality: String,
}

fn default_battery_level() -> i64 {
    100
}

fn default_data_quality() -> String {
    "good".to_string()
}

/// Input for an admin float update; unset fields are kept
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFloatInput {
    pub status: Option<FloatStatus>,
    pub battery_level: Option<i64>,
}

/// Latitude/longitude bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }

    /// Whether the box is well formed and within valid coordinate ranges
    pub fn is_valid(&self) -> bool {
        self.min_lat <= self.max_lat
            && self.min_lon <= self.max_lon
            && self.min_lat >= -90.0
            && self.max_lat <= 90.0
            && self.min_lon >= -180.0
            && self.max_lon <= 180.0
    }
}

/// A single measurement profile reported by a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OceanProfile {
    pub id: i64,
    pub float_id: String,
    pub profile_date: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Metres
    pub depth: Option<f64>,
    pub temperature: Option<f64>,
    pub salinity: Option<f64>,
    /// Decibar
    pub pressure: Option<f64>,
    /// µmol/kg
    pub oxygen: Option<f64>,
    pub quality_flag: Option<String>,
}

/// Before/after snapshot written by the float update trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloatAuditEntry {
    pub id: i64,
    pub float_id: String,
    pub old_status: String,
    pub new_status: String,
    pub old_battery: i64,
    pub new_battery: i64,
    pub changed_at: DateTime<Utc>,
}
