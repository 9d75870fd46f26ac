// THEORY:
// The `RegionAnalyzer` turns the frame-wide background mask into the two numbers the
// decision layer needs: how many object-sized things are moving inside the protected
// region, and what fraction of the region is moving.
//
// Algorithm steps:
// 1.  **Crop**: Only the protected window of the mask is consulted.
// 2.  **Denoise**: A morphological opening removes isolated foreground specks, then
//     a closing fills small holes inside real objects. Both use a 3x3 cross (the
//     3x3 ellipse) applied twice, which is the same as a single pass with a
//     radius-2 L1 structuring element.
// 3.  **Group**: Connected components of the cleaned mask become `Blob`s; only those
//     larger than `min_blob_area` count as significant.
// 4.  **Measure**: The motion ratio is the cleaned foreground pixel count over the
//     region area. A degenerate zero-area window yields a ratio of 0.

use crate::core_modules::blob::Blob;
use crate::core_modules::blob_detector::blob_detector;
use crate::core_modules::region::ClippedWindow;
use image::{GrayImage, imageops};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};

/// Iterations of the 3x3 cross, folded into the L1 radius.
const MORPH_RADIUS: u8 = 2;

/// The result of analyzing the protected region of one mask.
#[derive(Debug, Clone)]
pub struct RegionAnalysis {
    /// Components larger than the minimum object area.
    pub significant_blobs: Vec<Blob>,
    /// Fraction of the region covered by cleaned foreground, in [0, 1].
    pub motion_ratio: f64,
    /// The denoised region mask the ratio was measured on.
    pub cleaned_mask: GrayImage,
}

impl RegionAnalysis {
    pub fn blob_count(&self) -> usize {
        self.significant_blobs.len()
    }
}

pub struct RegionAnalyzer {
    min_blob_area: usize,
}

impl RegionAnalyzer {
    pub fn new(min_blob_area: usize) -> Self {
        Self { min_blob_area }
    }

    pub fn analyze(&self, mask: &GrayImage, window: &ClippedWindow) -> RegionAnalysis {
        let area = window.area();
        if area == 0 {
            return RegionAnalysis {
                significant_blobs: Vec::new(),
                motion_ratio: 0.0,
                cleaned_mask: GrayImage::new(window.width, window.height),
            };
        }

        let cropped =
            imageops::crop_imm(mask, window.x, window.y, window.width, window.height).to_image();
        let cleaned = denoise(&cropped);

        let foreground = cleaned.pixels().filter(|p| p[0] > 0).count() as u64;
        let motion_ratio = (foreground as f64 / area as f64).clamp(0.0, 1.0);

        let significant_blobs: Vec<Blob> = blob_detector::find_blobs(&cleaned)
            .into_iter()
            .filter(|blob| blob.area > self.min_blob_area)
            .collect();

        RegionAnalysis {
            significant_blobs,
            motion_ratio,
            cleaned_mask: cleaned,
        }
    }
}

/// Opening followed by closing.
pub fn denoise(mask: &GrayImage) -> GrayImage {
    let opened = open(mask, Norm::L1, MORPH_RADIUS);
    close(&opened, Norm::L1, MORPH_RADIUS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn window(x: u32, y: u32, width: u32, height: u32) -> ClippedWindow {
        ClippedWindow { x, y, width, height }
    }

    #[test]
    fn empty_mask_has_zero_ratio() {
        let analyzer = RegionAnalyzer::new(800);
        let mask = GrayImage::new(200, 200);
        let result = analyzer.analyze(&mask, &window(50, 50, 100, 100));
        assert_eq!(result.blob_count(), 0);
        assert_eq!(result.motion_ratio, 0.0);
        assert_eq!(result.cleaned_mask.dimensions(), (100, 100));
    }

    #[test]
    fn zero_area_window_is_degenerate() {
        let analyzer = RegionAnalyzer::new(800);
        let mask = GrayImage::from_pixel(50, 50, Luma([255]));
        let result = analyzer.analyze(&mask, &window(50, 50, 0, 0));
        assert_eq!(result.motion_ratio, 0.0);
        assert_eq!(result.blob_count(), 0);
    }

    #[test]
    fn isolated_specks_are_removed() {
        let analyzer = RegionAnalyzer::new(800);
        let mut mask = GrayImage::new(100, 100);
        for i in 0..10 {
            mask.put_pixel(i * 9 + 3, i * 7 + 5, Luma([255]));
        }
        let result = analyzer.analyze(&mask, &window(0, 0, 100, 100));
        assert_eq!(result.motion_ratio, 0.0);
        assert_eq!(result.blob_count(), 0);
    }

    #[test]
    fn large_object_is_a_significant_blob() {
        let analyzer = RegionAnalyzer::new(800);
        let mut mask = GrayImage::new(200, 200);
        draw_filled_rect_mut(&mut mask, Rect::at(60, 60).of_size(50, 50), Luma([255]));

        let result = analyzer.analyze(&mask, &window(50, 50, 100, 100));
        assert_eq!(result.blob_count(), 1);
        // Opening trims a few corner pixels off the square.
        assert!(result.motion_ratio > 0.24 && result.motion_ratio <= 0.25);
        assert!(result.significant_blobs[0].area > 2400);
    }

    #[test]
    fn small_object_is_not_significant() {
        let analyzer = RegionAnalyzer::new(800);
        let mut mask = GrayImage::new(100, 100);
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(20, 20), Luma([255]));

        let result = analyzer.analyze(&mask, &window(0, 0, 100, 100));
        assert_eq!(result.blob_count(), 0);
        assert!(result.motion_ratio > 0.0);
    }

    #[test]
    fn only_the_region_is_consulted() {
        let analyzer = RegionAnalyzer::new(800);
        let mut mask = GrayImage::new(200, 100);
        draw_filled_rect_mut(&mut mask, Rect::at(120, 0).of_size(80, 100), Luma([255]));

        let result = analyzer.analyze(&mask, &window(0, 0, 100, 100));
        assert_eq!(result.motion_ratio, 0.0);
        assert_eq!(result.blob_count(), 0);
    }

    #[test]
    fn ratio_never_exceeds_one() {
        let analyzer = RegionAnalyzer::new(800);
        let mask = GrayImage::from_pixel(100, 100, Luma([255]));
        let result = analyzer.analyze(&mask, &window(0, 0, 100, 100));
        assert_eq!(result.motion_ratio, 1.0);
        assert_eq!(result.blob_count(), 1);
    }
}
