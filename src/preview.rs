#![warn(clippy::pedantic)]

use slm_sys::Frame;

pub const SATURATION_LEVEL: u8 = 255;
/// More pixels than this at full scale means the camera exposure needs turning down.
pub const SATURATION_PIXEL_LIMIT: usize = 64;

#[must_use]
pub fn saturated_pixels(frame: &Frame) -> usize {
    frame
        .pixels()
        .filter(|p| p.0[0] >= SATURATION_LEVEL)
        .count()
}

#[must_use]
pub fn is_saturated(frame: &Frame) -> bool {
    saturated_pixels(frame) > SATURATION_PIXEL_LIMIT
}

#[derive(Debug, Clone)]
pub struct PreviewReport {
    pub frame: Frame,
    pub saturated_pixels: usize,
}

impl PreviewReport {
    #[must_use]
    pub fn new(frame: Frame) -> Self {
        let saturated_pixels = saturated_pixels(&frame);
        PreviewReport {
            frame,
            saturated_pixels,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.saturated_pixels > SATURATION_PIXEL_LIMIT
    }
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn frame_with_hot_pixels(n: u32) -> Frame {
        Frame::from_fn(16, 16, |x, y| {
            if y * 16 + x < n {
                Luma([255])
            } else {
                Luma([254])
            }
        })
    }

    #[test]
    fn threshold_is_exclusive() {
        assert_eq!(saturated_pixels(&frame_with_hot_pixels(64)), 64);
        assert!(!is_saturated(&frame_with_hot_pixels(64)));
        assert!(is_saturated(&frame_with_hot_pixels(65)));
        assert!(PreviewReport::new(frame_with_hot_pixels(200)).is_saturated());
        assert!(!PreviewReport::new(Frame::new(16, 16)).is_saturated());
    }
}
