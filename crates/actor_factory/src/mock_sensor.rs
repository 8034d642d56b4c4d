//! Mock sensor implementation
//!
//! Tick-driven: the mock client calls [`MockSensorCore::emit`] once per
//! simulation step, the way CARLA delivers one sample per sensor per tick in
//! synchronous mode. Delivery can be delayed onto a background thread to
//! mimic callbacks arriving after `tick()` returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    GnssData, ImageData, ImuData, SensorDataCallback, SensorKind, SensorPacket, SensorPayload,
    SensorSource, Vector3,
};
use tracing::{debug, trace};

/// Mock sensor configuration
#[derive(Debug, Clone)]
pub struct MockSensorConfig {
    /// Image width (camera kinds only)
    pub image_width: u32,
    /// Image height (camera kinds only)
    pub image_height: u32,
    /// Deliver each sample from a background thread after this delay
    pub delivery_delay: Option<Duration>,
}

impl Default for MockSensorConfig {
    fn default() -> Self {
        Self {
            image_width: 8,
            image_height: 6,
            delivery_delay: None,
        }
    }
}

struct Registration {
    sensor_id: String,
    kind: SensorKind,
    callback: SensorDataCallback,
}

/// State shared between the mock client (which emits) and every
/// [`MockSensor`] handle (which listens)
pub struct MockSensorCore {
    kind: SensorKind,
    config: MockSensorConfig,
    listening: AtomicBool,
    registration: Mutex<Option<Registration>>,
}

impl MockSensorCore {
    pub fn new(kind: SensorKind, config: MockSensorConfig) -> Self {
        Self {
            kind,
            config,
            listening: AtomicBool::new(false),
            registration: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    /// Produce the sample for `frame`, if anyone is listening
    pub fn emit(&self, frame: u64, timestamp: f64) {
        if !self.is_listening() {
            return;
        }
        let (sensor_id, kind, callback) = {
            let registration = self.registration.lock().unwrap();
            match registration.as_ref() {
                Some(r) => (r.sensor_id.clone(), r.kind, r.callback.clone()),
                None => return,
            }
        };

        let packet = SensorPacket {
            sensor_id,
            kind,
            frame,
            timestamp,
            payload: generate_payload(&self.config, kind, frame),
        };

        match self.config.delivery_delay {
            Some(delay) => {
                thread::spawn(move || {
                    thread::sleep(delay);
                    callback(packet);
                });
            }
            None => callback(packet),
        }
        trace!(frame, "mock sample emitted");
    }
}

/// Generate simulated data payload
fn generate_payload(config: &MockSensorConfig, kind: SensorKind, frame: u64) -> SensorPayload {
    match kind {
        SensorKind::Rgb | SensorKind::Segmentation | SensorKind::Depth => {
            let (w, h) = (config.image_width, config.image_height);
            let mut data = Vec::with_capacity(w as usize * h as usize * 4);
            for y in 0..h {
                for x in 0..w {
                    let pixel = match kind {
                        // R carries the semantic tag
                        SensorKind::Segmentation => [0, 0, ((x + y) % 23) as u8, 255],
                        SensorKind::Depth => [0, (frame % 256) as u8, (x % 256) as u8, 255],
                        _ => [(x % 256) as u8, (y % 256) as u8, (frame % 256) as u8, 255],
                    };
                    data.extend_from_slice(&pixel);
                }
            }
            SensorPayload::Image(ImageData {
                width: w,
                height: h,
                data: Bytes::from(data),
            })
        }
        SensorKind::Imu => SensorPayload::Imu(ImuData {
            accelerometer: Vector3 {
                x: 0.0,
                y: 0.0,
                z: 9.81,
            },
            gyroscope: Vector3::default(),
            compass: (frame as f64 * 0.01) % std::f64::consts::TAU,
        }),
        SensorKind::Gnss => SensorPayload::Gnss(GnssData {
            latitude: 49.0 + frame as f64 * 1e-6,
            longitude: 8.0 + frame as f64 * 1e-6,
            altitude: 0.0,
        }),
    }
}

/// Mock sensor
///
/// Implements `SensorSource`; many handles may point at one core.
pub struct MockSensor {
    sensor_id: String,
    kind: SensorKind,
    core: Arc<MockSensorCore>,
}

impl MockSensor {
    pub fn new(sensor_id: String, core: Arc<MockSensorCore>) -> Self {
        let kind = core.kind();
        Self {
            sensor_id,
            kind,
            core,
        }
    }
}

impl SensorSource for MockSensor {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn listen(&self, callback: SensorDataCallback) {
        // Idempotent: if already listening, don't register again
        if self.core.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.core.registration.lock().unwrap() = Some(Registration {
            sensor_id: self.sensor_id.clone(),
            kind: self.kind,
            callback,
        });
        debug!(sensor_id = %self.sensor_id, kind = %self.kind, "mock sensor listening");
    }

    fn stop(&self) {
        self.core.stop();
    }

    fn is_listening(&self) -> bool {
        self.core.is_listening()
    }
}
