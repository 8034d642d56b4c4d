//! Telemetry records

use contracts::{GnssData, ImuData};
use serde::{Deserialize, Serialize};

/// Combined IMU + GNSS record, one per frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "Accelerometer")]
    pub accelerometer: [f64; 3],

    #[serde(rename = "Gyroscope")]
    pub gyroscope: [f64; 3],

    /// Heading in degrees
    #[serde(rename = "Compass")]
    pub compass: f64,

    #[serde(rename = "Latitude")]
    pub latitude: f64,

    #[serde(rename = "Longitude")]
    pub longitude: f64,
}

impl TelemetryRecord {
    pub fn new(imu: &ImuData, gnss: &GnssData) -> Self {
        Self {
            accelerometer: imu.accelerometer.to_array(),
            gyroscope: imu.gyroscope.to_array(),
            compass: imu.compass.to_degrees(),
            latitude: gnss.latitude,
            longitude: gnss.longitude,
        }
    }
}
