use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type WorkerId = i32;

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("unknown vehicle type {0:?}, expected one of car, motorcycle, scooter")]
    UnknownVehicleType(String),
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    #[default]
    Car,
    Motorcycle,
    Scooter,
}

impl VehicleType {
    pub const fn as_str(self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::Scooter => "scooter",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(VehicleType::Car),
            "motorcycle" => Ok(VehicleType::Motorcycle),
            "scooter" => Ok(VehicleType::Scooter),
            _ => Err(PayloadError::UnknownVehicleType(s.to_string())),
        }
    }
}

/// A validated WGS84 coordinate.
#[derive(Serialize, Copy, Clone, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, PayloadError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(PayloadError::Latitude(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(PayloadError::Longitude(lng));
        }
        Ok(Self { lat, lng })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct PositionReport {
    pub worker_id: WorkerId,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionReport {
    pub fn point(&self) -> Result<GeoPoint, PayloadError> {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Shift open/close command sent by a worker's client. A missing `at` means "now".
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct ShiftCommand {
    pub worker_id: WorkerId,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct ForceCloseCommand {
    pub at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct WorkerRegistration {
    pub id: WorkerId,
    pub full_name: String,
    pub worker_number: i32,
    /// Free-form category from the admin form, validated by [`WorkerRegistration::vehicle`].
    pub vehicle_type: Option<String>,
}

impl WorkerRegistration {
    pub fn vehicle(&self, default: VehicleType) -> Result<VehicleType, PayloadError> {
        match self.vehicle_type.as_deref() {
            None | Some("") => Ok(default),
            Some(raw) => raw.parse(),
        }
    }
}
