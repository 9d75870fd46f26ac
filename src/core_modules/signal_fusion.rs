// THEORY:
// Every individual motion signal lies in its own way: the background mask flickers,
// frame differencing reacts to camera jitter, and a raw pixel ratio ignores whether
// the moving pixels form an object at all. `SignalFusion` asks for corroboration:
// a frame counts as "motion" only when at least two of three independent criteria
// agree.
//
// This is a pure function of its inputs, with no state.

/// Criterion 2 accepts a lower ratio when the frame difference corroborates it.
pub const DIFF_RATIO_FACTOR: f64 = 0.8;
/// Criterion 3 demands a clearly higher ratio when it stands on its own.
pub const HIGH_RATIO_FACTOR: f64 = 1.5;
/// Votes needed for a positive verdict.
pub const REQUIRED_VOTES: usize = 2;

/// The three evaluated criteria for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FusionCriteria {
    /// A significant blob is present and the ratio exceeds the threshold.
    pub blob_motion: bool,
    /// The frame differencer fired and the ratio exceeds 0.8x the threshold.
    pub diff_motion: bool,
    /// The ratio alone exceeds 1.5x the threshold.
    pub high_ratio: bool,
}

impl FusionCriteria {
    pub fn evaluate(blob_count: usize, diff_flag: bool, motion_ratio: f64, threshold: f64) -> Self {
        Self {
            blob_motion: blob_count > 0 && motion_ratio > threshold,
            diff_motion: diff_flag && motion_ratio > DIFF_RATIO_FACTOR * threshold,
            high_ratio: motion_ratio > HIGH_RATIO_FACTOR * threshold,
        }
    }

    pub fn votes(&self) -> usize {
        [self.blob_motion, self.diff_motion, self.high_ratio]
            .iter()
            .filter(|&&c| c)
            .count()
    }

    pub fn verdict(&self) -> bool {
        self.votes() >= REQUIRED_VOTES
    }
}

/// Majority vote over the three motion criteria.
pub fn fuse(blob_count: usize, diff_flag: bool, motion_ratio: f64, threshold: f64) -> bool {
    FusionCriteria::evaluate(blob_count, diff_flag, motion_ratio, threshold).verdict()
}
