//! Sensor rig description
//!
//! A [`CameraMount`] is one line of the camera-definition file. A [`SensorSpec`]
//! binds a mount to the sensor kind requested by the current capture pass.

use serde::{Deserialize, Serialize};

use crate::SensorKind;

/// 3D transform: location + rotation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Location (x, y, z) in meters
    pub location: Location,

    /// Rotation (pitch, yaw, roll) in degrees
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Transform {
    /// Transform with only a location set
    pub fn at(location: Location) -> Self {
        Self {
            location,
            rotation: Rotation::default(),
        }
    }
}

/// Camera position on the hero vehicle, relative to the vehicle origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraMount {
    /// Local name, also the output folder name
    pub name: String,

    /// Offset from the vehicle origin
    pub location: Location,

    /// Yaw in degrees, within [0, 360)
    pub yaw: f64,
}

impl CameraMount {
    /// Bind this mount to a sensor kind
    pub fn with_kind(&self, kind: SensorKind) -> SensorSpec {
        SensorSpec {
            local_name: self.name.clone(),
            location: self.location,
            yaw: self.yaw,
            kind,
        }
    }
}

/// Fully specified sensor to attach for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    pub local_name: String,
    pub location: Location,
    pub yaw: f64,
    pub kind: SensorKind,
}

impl SensorSpec {
    /// Sensor at the vehicle origin, used by the telemetry rig
    pub fn at_origin(local_name: impl Into<String>, kind: SensorKind) -> Self {
        Self {
            local_name: local_name.into(),
            location: Location::default(),
            yaw: 0.0,
            kind,
        }
    }

    /// Relative transform used when attaching to the parent vehicle
    pub fn transform(&self) -> Transform {
        Transform {
            location: self.location,
            rotation: Rotation {
                pitch: 0.0,
                yaw: self.yaw,
                roll: 0.0,
            },
        }
    }
}
