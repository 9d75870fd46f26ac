// THEORY:
// The `BlobDetector` is the spatial grouping step. It takes a binary mask and answers
// "which foreground pixels belong together?", turning a field of independent pixels
// into a short list of `Blob`s with a size that can be reasoned about.
//
// Key architectural principles & algorithm steps:
// 1.  **Labelling**: Connected-component labelling with 8-connectivity assigns every
//     foreground pixel the label of its component. Diagonal neighbours join, so a
//     thin diagonal limb does not split a person in two.
// 2.  **Data Aggregation**: One pass over the label image accumulates the area,
//     bounding box and centroid of every component.
// 3.  **Stateless Utility**: `find_blobs` has no memory of previous frames. Area
//     filtering is left to the caller, who knows what "significant" means.

use crate::core_modules::blob::{Blob, Point};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

pub mod blob_detector {
    use super::*;

    #[derive(Clone, Copy)]
    struct Accumulator {
        area: usize,
        min: Point,
        max: Point,
        sum_x: u64,
        sum_y: u64,
    }

    impl Accumulator {
        fn empty() -> Self {
            Self {
                area: 0,
                min: Point { x: u32::MAX, y: u32::MAX },
                max: Point { x: 0, y: 0 },
                sum_x: 0,
                sum_y: 0,
            }
        }

        fn add(&mut self, x: u32, y: u32) {
            self.area += 1;
            self.min.x = self.min.x.min(x);
            self.min.y = self.min.y.min(y);
            self.max.x = self.max.x.max(x);
            self.max.y = self.max.y.max(y);
            self.sum_x += x as u64;
            self.sum_y += y as u64;
        }
    }

    /// Finds every connected component of non-zero pixels in `mask`, ordered by label.
    pub fn find_blobs(mask: &GrayImage) -> Vec<Blob> {
        if mask.width() == 0 || mask.height() == 0 {
            return Vec::new();
        }

        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

        // Label 0 is the background.
        let mut accumulators: Vec<Accumulator> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if label > accumulators.len() {
                accumulators.resize(label, Accumulator::empty());
            }
            accumulators[label - 1].add(x, y);
        }

        accumulators
            .into_iter()
            .enumerate()
            .filter(|(_, acc)| acc.area > 0)
            .map(|(index, acc)| Blob {
                id: index as u32 + 1,
                bounding_box: (acc.min, acc.max),
                area: acc.area,
                center_of_mass: (
                    acc.sum_x as f64 / acc.area as f64,
                    acc.sum_y as f64 / acc.area as f64,
                ),
            })
            .collect()
    }
}
