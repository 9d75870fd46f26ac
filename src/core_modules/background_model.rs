// THEORY:
// The `BackgroundModel` is the long-memory half of the temporal analysis. Every pixel
// location owns a small mixture of Gaussians describing the colors it has shown over
// time. A pixel whose current color is explained by the heavy ("background") modes
// is background; anything else is foreground.
//
// Key architectural principles:
// 1.  **Adaptive Mixture**: Each location holds up to `MAX_MODES` weighted Gaussian
//     components (mean color, isotropic variance, weight). Matching components absorb
//     the new sample, unmatched samples spawn new low-weight components, and weights
//     that decay below the complexity prior are pruned.
// 2.  **Slow Learning**: The learning rate is tiny, so a lighting drift spread over
//     many frames is gradually folded into the background, while an object that
//     appears suddenly stays foreground for a long time.
// 3.  **No Shadows**: Shadow classification is never attempted. A pixel is either
//     background or foreground, nothing in between.
// 4.  **Self-Healing Shape**: If the frame resolution changes, all statistics are
//     discarded and the model starts again from the new frame rather than comparing
//     against buffers of a different size.

use image::{GrayImage, Luma, RgbImage};
use log::{debug, info};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

const MAX_MODES: usize = 5;
const CHANNELS: usize = 3;
/// Cumulative weight of the modes that are considered to describe the background.
const BACKGROUND_RATIO: f32 = 0.9;
/// Squared Mahalanobis distance under which a sample updates an existing mode.
const VAR_THRESHOLD_GEN: f32 = 9.0;
const VAR_INIT: f32 = 15.0;
const VAR_MIN: f32 = 4.0;
const VAR_MAX: f32 = 5.0 * VAR_INIT;
const COMPLEXITY_REDUCTION: f32 = 0.05;

#[derive(Debug, Clone, Copy, Default)]
struct Gaussian {
    weight: f32,
    variance: f32,
    mean: [f32; CHANNELS],
}

impl Gaussian {
    fn distance_sq(&self, sample: &[f32; CHANNELS]) -> f32 {
        self.mean
            .iter()
            .zip(sample)
            .map(|(m, s)| (m - s) * (m - s))
            .sum()
    }
}

/// Per-pixel Gaussian mixture background estimator.
pub struct BackgroundModel {
    learning_rate: f32,
    var_threshold: f32,
    width: u32,
    height: u32,
    /// `MAX_MODES` slots per pixel, row-major.
    modes: Vec<Gaussian>,
    /// Number of live modes in each pixel's slots.
    mode_counts: Vec<u8>,
    frames_seen: u64,
}

impl BackgroundModel {
    pub fn new(learning_rate: f64, var_threshold: f64) -> Self {
        Self {
            learning_rate: learning_rate as f32,
            var_threshold: var_threshold as f32,
            width: 0,
            height: 0,
            modes: Vec::new(),
            mode_counts: Vec::new(),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Discards every learned statistic. The next frame seeds a fresh model.
    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.modes.clear();
        self.mode_counts.clear();
        self.frames_seen = 0;
    }

    /// Classifies every pixel of `frame` and folds the frame into the model.
    /// Returns a mask of the same size with `FOREGROUND` for changed pixels.
    pub fn apply(&mut self, frame: &RgbImage) -> GrayImage {
        let (width, height) = frame.dimensions();
        if (width, height) != (self.width, self.height) {
            self.reinitialize(width, height);
        }

        let alpha = self.learning_rate;
        let var_threshold = self.var_threshold;
        let mut mask = GrayImage::new(width, height);

        for (((pixel, out), slots), count) in frame
            .pixels()
            .zip(mask.pixels_mut())
            .zip(self.modes.chunks_exact_mut(MAX_MODES))
            .zip(self.mode_counts.iter_mut())
        {
            let sample = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];
            let is_background = update_pixel(slots, count, &sample, alpha, var_threshold);
            *out = Luma([if is_background { BACKGROUND } else { FOREGROUND }]);
        }

        self.frames_seen += 1;
        mask
    }

    fn reinitialize(&mut self, width: u32, height: u32) {
        if self.width != 0 || self.height != 0 {
            info!(
                "Frame size changed from {}x{} to {}x{}, relearning background",
                self.width, self.height, width, height
            );
        } else {
            debug!("Initializing background model for {}x{} frames", width, height);
        }
        let pixels = width as usize * height as usize;
        self.width = width;
        self.height = height;
        self.modes = vec![Gaussian::default(); pixels * MAX_MODES];
        self.mode_counts = vec![0; pixels];
        self.frames_seen = 0;
    }
}

/// Updates one pixel's mixture with `sample`. Returns true if the sample is background.
fn update_pixel(
    modes: &mut [Gaussian],
    count: &mut u8,
    sample: &[f32; CHANNELS],
    alpha: f32,
    var_threshold: f32,
) -> bool {
    let decay = 1.0 - alpha;
    let prune = -alpha * COMPLEXITY_REDUCTION;
    let mut live = *count as usize;
    let mut fits = false;
    let mut background = false;
    let mut total_weight = 0.0f32;

    for mode in 0..live {
        let mut weight = decay * modes[mode].weight + prune;
        let mut slot = mode;

        if !fits {
            let g = &mut modes[mode];
            let dist2 = g.distance_sq(sample);

            if total_weight < BACKGROUND_RATIO && dist2 < var_threshold * g.variance {
                background = true;
            }

            if dist2 < VAR_THRESHOLD_GEN * g.variance {
                fits = true;
                weight += alpha;
                let k = alpha / weight;
                for (m, s) in g.mean.iter_mut().zip(sample) {
                    *m -= k * (*m - s);
                }
                g.variance = (g.variance + k * (dist2 - g.variance)).clamp(VAR_MIN, VAR_MAX);

                // Keep modes ordered by weight, heaviest first.
                while slot > 0 && weight >= modes[slot - 1].weight {
                    modes.swap(slot, slot - 1);
                    slot -= 1;
                }
            }
        }

        if weight < -prune {
            weight = 0.0;
        }
        modes[slot].weight = weight;
        total_weight += weight;
    }

    // Drop pruned modes, preserving order.
    let mut kept = 0;
    for mode in 0..live {
        if modes[mode].weight > 0.0 {
            modes[kept] = modes[mode];
            kept += 1;
        }
    }
    live = kept;

    if total_weight > 0.0 {
        let norm = 1.0 / total_weight;
        for g in &mut modes[..live] {
            g.weight *= norm;
        }
    }

    if !fits {
        let slot = if live == MAX_MODES { MAX_MODES - 1 } else { live };
        if slot == live {
            live += 1;
        }

        let weight = if live == 1 {
            1.0
        } else {
            for g in &mut modes[..live - 1] {
                g.weight *= decay;
            }
            alpha
        };
        modes[slot] = Gaussian {
            weight,
            variance: VAR_INIT,
            mean: *sample,
        };

        let mut slot = slot;
        while slot > 0 && weight >= modes[slot - 1].weight {
            modes.swap(slot, slot - 1);
            slot -= 1;
        }
    }

    *count = live as u8;
    background
}
