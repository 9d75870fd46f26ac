// THEORY:
// The `FrameDifferencer` is the short-memory, model-free motion signal. Where the
// background model asks "is this different from what the scene usually looks like?",
// the differencer only asks "is this different from one frame ago?". The two fail in
// different ways, which is what makes them useful together.
//
// The only state is the prior frame's grayscale, blurred region content. It is
// replaced every cycle and thrown away whenever the region is reset, so the first
// frame after a reset, or after the region's pixel window changes shape, never
// compares against stale or incompatible data.

use crate::core_modules::region::ClippedWindow;
use image::{GrayImage, RgbImage, imageops};
use imageproc::filter::gaussian_blur_f32;

/// The sigma a 5x5 Gaussian kernel gets when sigma is derived from the kernel size.
pub const BLUR_SIGMA: f32 = 1.1;

/// Crops `window` out of `frame`, converts it to grayscale and blurs it lightly to
/// suppress per-pixel sensor noise.
pub fn region_gray(frame: &RgbImage, window: &ClippedWindow) -> GrayImage {
    let crop =
        imageops::crop_imm(frame, window.x, window.y, window.width, window.height).to_image();
    let gray = imageops::grayscale(&crop);
    if window.is_empty() {
        return gray;
    }
    gaussian_blur_f32(&gray, BLUR_SIGMA)
}

pub struct FrameDifferencer {
    pixel_threshold: u8,
    area_fraction: f64,
    prior_gray: Option<GrayImage>,
}

impl FrameDifferencer {
    pub fn new(pixel_threshold: u8, area_fraction: f64) -> Self {
        Self {
            pixel_threshold,
            area_fraction,
            prior_gray: None,
        }
    }

    pub fn has_prior(&self) -> bool {
        self.prior_gray.is_some()
    }

    pub fn reset(&mut self) {
        self.prior_gray = None;
    }

    /// Compares `region_gray` with the previous cycle's region and stores it as the
    /// new baseline. Returns true if enough pixels changed.
    pub fn update(&mut self, region_gray: GrayImage) -> bool {
        let detected = match &self.prior_gray {
            Some(prior) if prior.dimensions() == region_gray.dimensions() => {
                let changed = self.changed_pixels(prior, &region_gray);
                let pixel_count = region_gray.width() as u64 * region_gray.height() as u64;
                changed as f64 > self.area_fraction * pixel_count as f64
            }
            _ => false,
        };
        self.prior_gray = Some(region_gray);
        detected
    }

    fn changed_pixels(&self, prior: &GrayImage, current: &GrayImage) -> u64 {
        prior
            .as_raw()
            .iter()
            .zip(current.as_raw())
            .filter(|(a, b)| a.abs_diff(**b) > self.pixel_threshold)
            .count() as u64
    }
}
