//! FrameWriter - writes one sensor's frames into its directory
//!
//! The directory is created lazily on the first write.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use contracts::{ImageData, SensorKind, SensorPacket, SensorPayload};
use serde::Serialize;
use tracing::{error, trace};

use crate::error::{DispatcherError, Result};
use crate::layout::frame_file_name;
use crate::metrics::{MetricsSnapshot, WriterMetrics};
use crate::transform::{bgra_to_rgba, cityscapes_palette, logarithmic_depth};

/// Writer bound to one output directory
#[derive(Debug)]
pub struct FrameWriter {
    dir: PathBuf,
    created: AtomicBool,
    metrics: WriterMetrics,
}

impl FrameWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            created: AtomicBool::new(false),
            metrics: WriterMetrics::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Persist one sample under `frame_index`, applying the kind transform
    ///
    /// Returns the written path.
    pub fn write_sample(&self, packet: &SensorPacket, frame_index: u64) -> Result<PathBuf> {
        let result = self.write_sample_inner(packet, frame_index);
        match &result {
            Ok(path) => trace!(path = %path.display(), "frame written"),
            Err(e) => {
                self.metrics.record_failure();
                error!(sensor_id = %packet.sensor_id, frame_index, error = %e, "write failed");
            }
        }
        result
    }

    /// Persist a JSON record under `frame_index` with extension `txt`
    pub fn write_record<T: Serialize>(&self, record: &T, frame_index: u64) -> Result<PathBuf> {
        self.write_json(record, frame_index).inspect_err(|e| {
            self.metrics.record_failure();
            error!(dir = %self.dir.display(), frame_index, error = %e, "record write failed");
        })
    }

    fn write_json<T: Serialize>(&self, record: &T, frame_index: u64) -> Result<PathBuf> {
        let path = self.frame_path(frame_index, "txt")?;
        let body = serde_json::to_vec(record)?;
        fs::write(&path, &body).map_err(|e| DispatcherError::io(&path, e))?;
        self.metrics.record_write(body.len());
        Ok(path)
    }

    fn write_sample_inner(&self, packet: &SensorPacket, frame_index: u64) -> Result<PathBuf> {
        match (&packet.payload, packet.kind) {
            (SensorPayload::Image(image), kind) if kind.is_camera() => {
                self.write_image(&packet.sensor_id, image, kind, frame_index)
            }
            (SensorPayload::Gnss(gnss), SensorKind::Gnss) => self.write_json(gnss, frame_index),
            (SensorPayload::Imu(imu), SensorKind::Imu) => self.write_json(imu, frame_index),
            (payload, kind) => Err(DispatcherError::PayloadMismatch {
                sensor_id: packet.sensor_id.clone(),
                kind,
                payload: payload.variant_name(),
            }),
        }
    }

    fn write_image(
        &self,
        sensor_id: &str,
        image: &ImageData,
        kind: SensorKind,
        frame_index: u64,
    ) -> Result<PathBuf> {
        if image.data.len() != image.expected_len() {
            return Err(DispatcherError::MalformedImage {
                sensor_id: sensor_id.to_string(),
                expected: image.expected_len(),
                actual: image.data.len(),
            });
        }

        let (pixels, color) = match kind {
            SensorKind::Segmentation => (cityscapes_palette(image), image::ColorType::Rgb8),
            SensorKind::Depth => (logarithmic_depth(image), image::ColorType::Rgb8),
            _ => (bgra_to_rgba(image), image::ColorType::Rgba8),
        };

        let path = self.frame_path(frame_index, kind.extension())?;
        image::save_buffer(&path, &pixels, image.width, image.height, color).map_err(|e| {
            DispatcherError::Image {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;
        self.metrics.record_write(pixels.len());
        Ok(path)
    }

    fn frame_path(&self, frame_index: u64, extension: &str) -> Result<PathBuf> {
        self.ensure_dir()?;
        Ok(self.dir.join(frame_file_name(frame_index, extension)))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.created.load(Ordering::Acquire) {
            fs::create_dir_all(&self.dir).map_err(|e| DispatcherError::io(&self.dir, e))?;
            self.created.store(true, Ordering::Release);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{GnssData, ImuData, Vector3};
    use tempfile::tempdir;

    fn camera_packet(kind: SensorKind, width: u32, height: u32) -> SensorPacket {
        SensorPacket {
            sensor_id: "front".into(),
            kind,
            frame: 42,
            timestamp: 4.2,
            payload: SensorPayload::Image(ImageData {
                width,
                height,
                data: Bytes::from(vec![7u8; (width * height * 4) as usize]),
            }),
        }
    }

    #[test]
    fn test_lazy_dir_and_png_name() {
        let dir = tempdir().unwrap();
        let sensor_dir = dir.path().join("run").join("ClearNoon").join("front");
        let writer = FrameWriter::new(&sensor_dir);
        assert!(!sensor_dir.exists());

        let path = writer
            .write_sample(&camera_packet(SensorKind::Rgb, 4, 3), 0)
            .unwrap();
        assert_eq!(path, sensor_dir.join("000000.png"));
        assert!(path.exists());

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
        assert_eq!(writer.metrics().write_count, 1);
    }

    #[test]
    fn test_segmentation_and_depth_write_rgb() {
        let dir = tempdir().unwrap();
        let writer = FrameWriter::new(dir.path());
        for (i, kind) in [SensorKind::Segmentation, SensorKind::Depth]
            .into_iter()
            .enumerate()
        {
            let path = writer
                .write_sample(&camera_packet(kind, 2, 2), i as u64)
                .unwrap();
            let decoded = image::open(&path).unwrap();
            assert_eq!(decoded.color(), image::ColorType::Rgb8);
        }
    }

    #[test]
    fn test_malformed_image_rejected() {
        let dir = tempdir().unwrap();
        let writer = FrameWriter::new(dir.path());
        let mut packet = camera_packet(SensorKind::Rgb, 2, 2);
        packet.payload = SensorPayload::Image(ImageData {
            width: 2,
            height: 2,
            data: Bytes::from_static(&[0; 3]),
        });
        let err = writer.write_sample(&packet, 0).unwrap_err();
        assert!(matches!(err, DispatcherError::MalformedImage { .. }));
        assert_eq!(writer.metrics().failure_count, 1);
    }

    #[test]
    fn test_payload_mismatch() {
        let dir = tempdir().unwrap();
        let writer = FrameWriter::new(dir.path());
        let packet = SensorPacket {
            sensor_id: "gps".into(),
            kind: SensorKind::Rgb,
            frame: 1,
            timestamp: 0.1,
            payload: SensorPayload::Gnss(GnssData {
                latitude: 1.0,
                longitude: 2.0,
                altitude: 3.0,
            }),
        };
        assert!(matches!(
            writer.write_sample(&packet, 0),
            Err(DispatcherError::PayloadMismatch { .. })
        ));
    }

    #[test]
    fn test_imu_record_is_json_text() {
        let dir = tempdir().unwrap();
        let writer = FrameWriter::new(dir.path());
        let packet = SensorPacket {
            sensor_id: "imu".into(),
            kind: SensorKind::Imu,
            frame: 3,
            timestamp: 0.3,
            payload: SensorPayload::Imu(ImuData {
                accelerometer: Vector3 {
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                },
                gyroscope: Vector3::default(),
                compass: 0.5,
            }),
        };
        let path = writer.write_sample(&packet, 12).unwrap();
        assert_eq!(path.file_name().unwrap(), "000012.txt");
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["compass"], 0.5);
    }
}
