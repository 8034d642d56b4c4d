//! Kind-specific pixel transforms
//!
//! CARLA delivers every camera image as BGRA. Segmentation images carry the
//! semantic tag in the red channel; depth images pack a 24-bit depth value
//! into R, G and B.

use contracts::ImageData;

/// CityScapes colors indexed by CARLA semantic tag
pub const CITYSCAPES_PALETTE: [[u8; 3]; 23] = [
    [0, 0, 0],       // unlabeled
    [70, 70, 70],    // building
    [100, 40, 40],   // fence
    [55, 90, 80],    // other
    [220, 20, 60],   // pedestrian
    [153, 153, 153], // pole
    [157, 234, 50],  // road line
    [128, 64, 128],  // road
    [244, 35, 232],  // sidewalk
    [107, 142, 35],  // vegetation
    [0, 0, 142],     // vehicle
    [102, 102, 156], // wall
    [220, 220, 0],   // traffic sign
    [70, 130, 180],  // sky
    [81, 0, 81],     // ground
    [150, 100, 100], // bridge
    [230, 150, 140], // rail track
    [180, 165, 180], // guard rail
    [250, 170, 30],  // traffic light
    [110, 190, 160], // static
    [170, 120, 50],  // dynamic
    [45, 60, 150],   // water
    [145, 170, 100], // terrain
];

/// ln(1000): depth range of the CARLA camera in meters
const LOG_DEPTH_RANGE: f64 = 5.70378;

/// BGRA to RGBA, alpha kept
pub fn bgra_to_rgba(image: &ImageData) -> Vec<u8> {
    let mut rgba = image.data.to_vec();
    for px in rgba.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    rgba
}

/// Semantic tags to CityScapes RGB; unknown tags map to black
pub fn cityscapes_palette(image: &ImageData) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.data.len() / 4 * 3);
    for px in image.data.chunks_exact(4) {
        let tag = px[2] as usize;
        let color = CITYSCAPES_PALETTE.get(tag).copied().unwrap_or([0, 0, 0]);
        rgb.extend_from_slice(&color);
    }
    rgb
}

/// Packed depth to logarithmic grayscale RGB
pub fn logarithmic_depth(image: &ImageData) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.data.len() / 4 * 3);
    for px in image.data.chunks_exact(4) {
        let value = log_depth_value(px[2], px[1], px[0]);
        rgb.extend_from_slice(&[value, value, value]);
    }
    rgb
}

fn log_depth_value(r: u8, g: u8, b: u8) -> u8 {
    let packed = r as f64 + g as f64 * 256.0 + b as f64 * 65536.0;
    let normalized = packed / (16_777_216.0 - 1.0);
    let log_depth = if normalized > 0.0 {
        1.0 + normalized.ln() / LOG_DEPTH_RANGE
    } else {
        0.0
    };
    (log_depth.clamp(0.005, 1.0) * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn image(pixels: &[[u8; 4]]) -> ImageData {
        ImageData {
            width: pixels.len() as u32,
            height: 1,
            data: Bytes::from(pixels.concat()),
        }
    }

    #[test]
    fn swaps_blue_and_red() {
        let rgba = bgra_to_rgba(&image(&[[1, 2, 3, 4]]));
        assert_eq!(rgba, vec![3, 2, 1, 4]);
    }

    #[test]
    fn palette_reads_red_channel() {
        let rgb = cityscapes_palette(&image(&[[0, 0, 7, 255], [9, 9, 10, 255], [0, 0, 200, 255]]));
        assert_eq!(&rgb[0..3], &[128, 64, 128]);
        assert_eq!(&rgb[3..6], &[0, 0, 142]);
        assert_eq!(&rgb[6..9], &[0, 0, 0]);
    }

    #[test]
    fn depth_extremes() {
        // Farthest point saturates to white
        assert_eq!(log_depth_value(255, 255, 255), 255);
        // Zero depth clamps to the floor
        assert_eq!(log_depth_value(0, 0, 0), (0.005 * 255.0) as u8);
        // Nearer is darker
        assert!(log_depth_value(0, 0, 1) < log_depth_value(0, 0, 128));
    }

    #[test]
    fn depth_output_is_gray() {
        let rgb = logarithmic_depth(&image(&[[10, 20, 30, 255]]));
        assert_eq!(rgb.len(), 3);
        assert!(rgb[0] == rgb[1] && rgb[1] == rgb[2]);
    }
}
