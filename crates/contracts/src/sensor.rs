//! SensorPacket - raw sample delivered by a sensor callback
//!
//! One packet per sensor per simulation tick while in lockstep mode.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Sensor variants the capture rig knows how to attach and persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Rgb,
    Segmentation,
    Depth,
    Gnss,
    Imu,
}

impl SensorKind {
    /// CARLA blueprint id for this sensor kind
    pub fn blueprint(self) -> &'static str {
        match self {
            Self::Rgb => "sensor.camera.rgb",
            Self::Segmentation => "sensor.camera.semantic_segmentation",
            Self::Depth => "sensor.camera.depth",
            Self::Gnss => "sensor.other.gnss",
            Self::Imu => "sensor.other.imu",
        }
    }

    /// Reverse lookup of [`SensorKind::blueprint`]
    pub fn from_blueprint(blueprint: &str) -> Option<Self> {
        [
            Self::Rgb,
            Self::Segmentation,
            Self::Depth,
            Self::Gnss,
            Self::Imu,
        ]
        .into_iter()
        .find(|kind| kind.blueprint() == blueprint)
    }

    /// File extension of persisted frames
    pub fn extension(self) -> &'static str {
        if self.is_camera() {
            "png"
        } else {
            "txt"
        }
    }

    /// Camera kinds produce images and react to vehicle light state
    pub fn is_camera(self) -> bool {
        matches!(self, Self::Rgb | Self::Segmentation | Self::Depth)
    }

    /// Short lowercase name, used for ground-truth condition folders
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::Segmentation => "segmentation",
            Self::Depth => "depth",
            Self::Gnss => "gnss",
            Self::Imu => "imu",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw sensor sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorPacket {
    /// Local sensor name (rig name)
    pub sensor_id: String,

    /// Sensor kind
    pub kind: SensorKind,

    /// Simulator frame number
    pub frame: u64,

    /// Simulation timestamp (seconds)
    pub timestamp: f64,

    /// Payload
    pub payload: SensorPayload,
}

/// Sensor payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SensorPayload {
    /// Camera image (RGB / depth / segmentation), raw BGRA as delivered by CARLA
    Image(ImageData),

    /// IMU measurement
    Imu(ImuData),

    /// GNSS measurement
    Gnss(GnssData),
}

impl SensorPayload {
    /// Short variant name for diagnostics
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Imu(_) => "imu",
            Self::Gnss(_) => "gnss",
        }
    }
}

/// Image data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// Image width
    pub width: u32,

    /// Image height
    pub height: u32,

    /// BGRA pixels, row major, 4 bytes per pixel
    pub data: Bytes,
}

impl ImageData {
    /// Number of bytes a well-formed buffer of this size holds
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// IMU data
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImuData {
    /// Accelerometer (m/s²)
    pub accelerometer: Vector3,

    /// Gyroscope (rad/s)
    pub gyroscope: Vector3,

    /// Compass (rad)
    pub compass: f64,
}

/// GNSS data
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GnssData {
    /// Latitude (degrees)
    pub latitude: f64,

    /// Longitude (degrees)
    pub longitude: f64,

    /// Altitude (meters)
    pub altitude: f64,
}

/// 3D vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}
