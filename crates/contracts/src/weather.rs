//! Weather conditions
//!
//! One [`WeatherCondition`] per line of the condition file. List order defines
//! run order; duplicates are kept.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Environmental scalars applied to the world before a pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct WeatherParams {
    #[validate(range(min = 0.0, max = 100.0))]
    pub cloudiness: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    pub precipitation: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    pub precipitation_deposits: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    pub wind_intensity: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    pub fog_density: f64,

    #[validate(range(min = 0.0))]
    pub fog_distance: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    pub wetness: f64,

    #[validate(range(min = 0.0, max = 360.0))]
    pub sun_azimuth_angle: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub sun_altitude_angle: f64,
}

impl WeatherParams {
    /// Name of every scalar in file order (after the condition name)
    pub const FIELD_NAMES: [&'static str; 9] = [
        "cloudiness",
        "precipitation",
        "precipitation_deposits",
        "wind_intensity",
        "fog_density",
        "fog_distance",
        "wetness",
        "sun_azimuth_angle",
        "sun_altitude_angle",
    ];

    /// Build from the nine scalars in [`WeatherParams::FIELD_NAMES`] order
    pub fn from_scalars(v: [f64; 9]) -> Self {
        Self {
            cloudiness: v[0],
            precipitation: v[1],
            precipitation_deposits: v[2],
            wind_intensity: v[3],
            fog_density: v[4],
            fog_distance: v[5],
            wetness: v[6],
            sun_azimuth_angle: v[7],
            sun_altitude_angle: v[8],
        }
    }
}

/// Named weather + lighting condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct WeatherCondition {
    /// Condition name, also the output folder name
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(nested)]
    pub params: WeatherParams,

    /// Whether vehicle headlights are switched on for camera passes
    pub headlights_on: bool,
}

/// Vehicle light bitmask, mirrors CARLA's `VehicleLightState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VehicleLightState(pub u32);

impl VehicleLightState {
    pub const NONE: Self = Self(0);
    pub const POSITION: Self = Self(1);
    pub const LOW_BEAM: Self = Self(1 << 1);
    pub const HIGH_BEAM: Self = Self(1 << 2);
    pub const BRAKE: Self = Self(1 << 3);
    pub const FOG: Self = Self(1 << 7);

    /// Light group used for night / low-visibility captures
    pub const HEADLIGHTS: Self = Self(Self::POSITION.0 | Self::LOW_BEAM.0 | Self::FOG.0);

    /// Light state for a condition's headlight flag
    pub fn for_headlights(on: bool) -> Self {
        if on {
            Self::HEADLIGHTS
        } else {
            Self::NONE
        }
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}
