//! CARLA sensor data conversion
//!
//! Turns native CARLA measurements into `SensorPacket`s.
//! Only compiled when `real-carla` feature is enabled.

use bytes::Bytes;
use carla::sensor::data::{GnssMeasurement, Image, ImuMeasurement};
use carla::sensor::{SensorData, SensorDataBase};
use contracts::{GnssData, ImageData, ImuData, SensorKind, SensorPacket, SensorPayload, Vector3};

fn image_to_payload(image: &Image) -> SensorPayload {
    SensorPayload::Image(ImageData {
        width: image.width() as u32,
        height: image.height() as u32,
        data: Bytes::copy_from_slice(image.as_raw_bytes()),
    })
}

fn imu_to_payload(imu: &ImuMeasurement) -> SensorPayload {
    let accel = imu.accelerometer();
    let gyro = imu.gyroscope();
    SensorPayload::Imu(ImuData {
        accelerometer: Vector3 {
            x: accel.x as f64,
            y: accel.y as f64,
            z: accel.z as f64,
        },
        gyroscope: Vector3 {
            x: gyro.x as f64,
            y: gyro.y as f64,
            z: gyro.z as f64,
        },
        compass: imu.compass() as f64,
    })
}

fn gnss_to_payload(gnss: &GnssMeasurement) -> SensorPayload {
    SensorPayload::Gnss(GnssData {
        latitude: gnss.latitude(),
        longitude: gnss.longitude(),
        // carla-rust names the altitude accessor `attitude`
        altitude: gnss.attitude(),
    })
}

/// Convert one CARLA measurement
///
/// Returns None when the data type does not match the sensor kind.
pub fn convert_sensor_data(
    sensor_id: &str,
    kind: SensorKind,
    data: &SensorData,
) -> Option<SensorPacket> {
    let payload = match kind {
        SensorKind::Rgb | SensorKind::Segmentation | SensorKind::Depth => {
            image_to_payload(&Image::try_from(data.clone()).ok()?)
        }
        SensorKind::Imu => imu_to_payload(&ImuMeasurement::try_from(data.clone()).ok()?),
        SensorKind::Gnss => gnss_to_payload(&GnssMeasurement::try_from(data.clone()).ok()?),
    };

    Some(SensorPacket {
        sensor_id: sensor_id.to_string(),
        kind,
        frame: data.frame() as u64,
        timestamp: data.timestamp(),
        payload,
    })
}
