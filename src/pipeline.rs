// THEORY:
// The `pipeline` module is the top-level API of the breach engine. It wires the core
// modules into one per-frame cycle:
//
//   frame -> BackgroundModel -> mask -> RegionAnalyzer -> blobs + motion ratio
//   frame -> FrameDifferencer -> diff flag
//   (blobs, diff flag, ratio) -> SignalFusion -> verdict -> BreachStateMachine
//
// All mutable session state (background statistics, prior region grayscale, breach
// counter) lives in one exclusively-owned `DetectorState` that is passed into
// `analyze_frame`. Nothing is global, so independent regions can each own a state,
// and tests can drive the cycle directly. `BreachPipeline` bundles a state with its
// configuration and the current protected region for callers that want a single
// object with `set_region` / `clear_region` / `process_frame`.

use crate::core_modules::background_model::BackgroundModel;
use crate::core_modules::blob::Blob;
use crate::core_modules::frame_differencer::{FrameDifferencer, region_gray};
use crate::core_modules::region::ProtectedRegion;
use crate::core_modules::region_analyzer::RegionAnalyzer;
use crate::core_modules::signal_fusion::FusionCriteria;
use crate::error::{Result, SentinelError};
use image::{GrayImage, RgbImage};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

// Re-export key data structures for the public API.
pub use crate::core_modules::breach_state::{BreachPhase, BreachStateMachine, BreachTransition};

/// Configuration for the breach pipeline, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fraction of region pixels that must be moving, in (0, 1].
    pub breach_threshold: f64,
    /// Consecutive positive verdicts needed to raise the alarm (and quiet ones to clear it).
    pub required_frames: u32,
    /// Components must be strictly larger than this many pixels to count as objects.
    pub min_blob_area: usize,
    pub background_learning_rate: f64,
    /// Squared distance, in variances, under which a pixel matches a background mode.
    pub background_var_threshold: f64,
    /// Per-pixel intensity change the frame differencer considers real.
    pub frame_diff_pixel_threshold: u8,
    /// Fraction of region pixels that must change for the differencer to fire.
    pub frame_diff_area_fraction: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            breach_threshold: 0.15,
            required_frames: 6,
            min_blob_area: 800,
            background_learning_rate: 0.0005,
            background_var_threshold: 10.0,
            frame_diff_pixel_threshold: 25,
            frame_diff_area_fraction: 0.05,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        fn fraction(name: &str, value: f64) -> Result<()> {
            if value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(SentinelError::InvalidConfig(format!(
                    "{name} must be in (0, 1], got {value}"
                )))
            }
        }

        fraction("breach_threshold", self.breach_threshold)?;
        fraction("background_learning_rate", self.background_learning_rate)?;
        fraction("frame_diff_area_fraction", self.frame_diff_area_fraction)?;

        if self.required_frames == 0 {
            return Err(SentinelError::InvalidConfig(
                "required_frames must be at least 1".to_string(),
            ));
        }
        if self.background_var_threshold.is_nan() || self.background_var_threshold <= 0.0 {
            return Err(SentinelError::InvalidConfig(format!(
                "background_var_threshold must be positive, got {}",
                self.background_var_threshold
            )));
        }
        Ok(())
    }
}

/// The mutable state of one monitored region, owned by exactly one caller.
pub struct DetectorState {
    background: BackgroundModel,
    differencer: FrameDifferencer,
    breach: BreachStateMachine,
    frames_processed: u64,
    /// Dimensions of the last frame seen, to detect a capture reconfiguration.
    frame_size: Option<(u32, u32)>,
}

impl DetectorState {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            background: BackgroundModel::new(
                config.background_learning_rate,
                config.background_var_threshold,
            ),
            differencer: FrameDifferencer::new(
                config.frame_diff_pixel_threshold,
                config.frame_diff_area_fraction,
            ),
            breach: BreachStateMachine::new(config.required_frames),
            frames_processed: 0,
            frame_size: None,
        }
    }

    /// Forces the breach machine to `Clear` and forgets the prior region content.
    /// The background statistics describe the whole frame and are kept.
    pub fn reset_region_state(&mut self) {
        self.breach.reset();
        self.differencer.reset();
    }

    pub fn breach_counter(&self) -> u32 {
        self.breach.counter()
    }

    pub fn is_breached(&self) -> bool {
        self.breach.is_breached()
    }

    pub fn phase(&self) -> BreachPhase {
        self.breach.phase()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

/// Everything the engine concluded about one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    /// Zero-based position of this frame in the stream.
    pub frame_index: u64,
    /// The debounced alarm state.
    pub breach_state: bool,
    pub phase: BreachPhase,
    pub breach_counter: u32,
    /// Cleaned foreground fraction of the protected region, in [0, 1].
    pub motion_ratio: f64,
    pub blob_count: usize,
    pub blobs: Vec<Blob>,
    pub diff_flag: bool,
    pub criteria: FusionCriteria,
    /// The fused, un-debounced verdict for this frame.
    pub verdict: bool,
    /// Set on the frame where the breach state flipped.
    pub transition: Option<BreachTransition>,
    /// The denoised region mask, absent when no region is set or the frame size
    /// just changed.
    pub region_mask: Option<GrayImage>,
}

impl FrameAnalysis {
    fn idle(frame_index: u64, state: &DetectorState) -> Self {
        Self {
            frame_index,
            breach_state: state.is_breached(),
            phase: state.phase(),
            breach_counter: state.breach_counter(),
            motion_ratio: 0.0,
            blob_count: 0,
            blobs: Vec::new(),
            diff_flag: false,
            criteria: FusionCriteria::default(),
            verdict: false,
            transition: None,
            region_mask: None,
        }
    }
}

/// Runs one analysis cycle. Must be called once per frame, in arrival order.
///
/// The background model is advanced even when `region` is `None`, so it is already
/// warm when a region is selected. A frame whose size differs from the previous one
/// only reseeds the background and the prior region content: it reports a negative
/// verdict and leaves the breach counter untouched.
pub fn analyze_frame(
    state: &mut DetectorState,
    frame: &RgbImage,
    region: Option<&ProtectedRegion>,
    config: &PipelineConfig,
) -> FrameAnalysis {
    let frame_index = state.frames_processed;
    state.frames_processed += 1;

    let dimensions = frame.dimensions();
    let resized = state.frame_size.is_some_and(|size| size != dimensions);
    state.frame_size = Some(dimensions);

    let mask = state.background.apply(frame);

    let Some(region) = region else {
        state.reset_region_state();
        return FrameAnalysis::idle(frame_index, state);
    };

    let window = region.clip_to(frame.width(), frame.height());

    if resized {
        state.differencer.reset();
        if !window.is_empty() {
            state.differencer.update(region_gray(frame, &window));
        }
        info!(
            "Frame size changed to {}x{} at frame {}, skipping breach update",
            dimensions.0, dimensions.1, frame_index
        );
        return FrameAnalysis::idle(frame_index, state);
    }

    let analysis = RegionAnalyzer::new(config.min_blob_area).analyze(&mask, &window);

    let diff_flag = if window.is_empty() {
        state.differencer.reset();
        false
    } else {
        state.differencer.update(region_gray(frame, &window))
    };

    let criteria = FusionCriteria::evaluate(
        analysis.blob_count(),
        diff_flag,
        analysis.motion_ratio,
        config.breach_threshold,
    );
    let verdict = criteria.verdict();
    let transition = state.breach.update(verdict);

    debug!(
        "frame {}: ratio={:.3} blobs={} diff={} votes={} counter={}/{}",
        frame_index,
        analysis.motion_ratio,
        analysis.blob_count(),
        diff_flag,
        criteria.votes(),
        state.breach.counter(),
        state.breach.required_frames()
    );

    match transition {
        Some(BreachTransition::Started) => warn!(
            "Breach detected in region {} at frame {} (motion {:.1}%)",
            region,
            frame_index,
            analysis.motion_ratio * 100.0
        ),
        Some(BreachTransition::Cleared) => {
            info!("Breach cleared in region {} at frame {}", region, frame_index)
        }
        None => {}
    }

    FrameAnalysis {
        frame_index,
        breach_state: state.is_breached(),
        phase: state.phase(),
        breach_counter: state.breach_counter(),
        motion_ratio: analysis.motion_ratio,
        blob_count: analysis.blob_count(),
        blobs: analysis.significant_blobs,
        diff_flag,
        criteria,
        verdict,
        transition,
        region_mask: Some(analysis.cleaned_mask),
    }
}

/// The main, top-level struct for the breach engine.
pub struct BreachPipeline {
    config: PipelineConfig,
    region: Option<ProtectedRegion>,
    state: DetectorState,
    last_motion_ratio: f64,
}

impl BreachPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: DetectorState::new(&config),
            config,
            region: None,
            last_motion_ratio: 0.0,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn region(&self) -> Option<&ProtectedRegion> {
        self.region.as_ref()
    }

    /// Replaces the protected region. The breach machine restarts from `Clear` and
    /// the first frame analyzed afterwards never reports a frame difference.
    pub fn set_region(&mut self, region: ProtectedRegion) {
        info!("Protected region set to {}", region);
        self.region = Some(region);
        self.state.reset_region_state();
        self.last_motion_ratio = 0.0;
    }

    /// Validates and sets a region. On rejection the current region is kept.
    pub fn set_region_rect(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<()> {
        let region = ProtectedRegion::new(x, y, width, height)?;
        self.set_region(region);
        Ok(())
    }

    /// Drops the region and forces `Clear`. Returns true if a breach was active.
    pub fn clear_region(&mut self) -> bool {
        let was_breached = self.state.is_breached();
        if self.region.take().is_some() {
            info!("Protected region cleared");
        }
        self.state.reset_region_state();
        self.last_motion_ratio = 0.0;
        was_breached
    }

    pub fn process_frame(&mut self, frame: &RgbImage) -> FrameAnalysis {
        let analysis = analyze_frame(&mut self.state, frame, self.region.as_ref(), &self.config);
        self.last_motion_ratio = analysis.motion_ratio;
        analysis
    }

    pub fn breach_detected(&mut self, frame: &RgbImage) -> bool {
        self.process_frame(frame).breach_state
    }

    pub fn is_breached(&self) -> bool {
        self.state.is_breached()
    }

    pub fn breach_counter(&self) -> u32 {
        self.state.breach_counter()
    }

    pub fn phase(&self) -> BreachPhase {
        self.state.phase()
    }

    pub fn last_motion_ratio(&self) -> f64 {
        self.last_motion_ratio
    }

    pub fn frames_processed(&self) -> u64 {
        self.state.frames_processed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    const WIDTH: u32 = 200;
    const HEIGHT: u32 = 150;

    fn empty_frame() -> RgbImage {
        RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([40, 40, 40]))
    }

    fn intruder_frame() -> RgbImage {
        let mut frame = empty_frame();
        draw_filled_rect_mut(
            &mut frame,
            Rect::at(70, 45).of_size(60, 60),
            Rgb([220, 210, 200]),
        );
        frame
    }

    fn region() -> ProtectedRegion {
        ProtectedRegion::new(50, 25, 100, 100).unwrap()
    }

    /// A pipeline whose background has already seen the empty scene.
    fn warm_pipeline() -> BreachPipeline {
        let mut pipeline = BreachPipeline::new(PipelineConfig::default()).unwrap();
        for _ in 0..3 {
            pipeline.process_frame(&empty_frame());
        }
        pipeline.set_region(region());
        pipeline
    }

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = [
            PipelineConfig {
                breach_threshold: 0.0,
                ..Default::default()
            },
            PipelineConfig {
                breach_threshold: 1.5,
                ..Default::default()
            },
            PipelineConfig {
                required_frames: 0,
                ..Default::default()
            },
            PipelineConfig {
                background_learning_rate: -0.1,
                ..Default::default()
            },
            PipelineConfig {
                frame_diff_area_fraction: 2.0,
                ..Default::default()
            },
            PipelineConfig {
                background_var_threshold: f64::NAN,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(SentinelError::InvalidConfig(_))));
            assert!(BreachPipeline::new(config).is_err());
        }
    }

    #[test]
    fn partial_json_config_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "breach_threshold": 0.2, "required_frames": 4 }"#).unwrap();
        assert_eq!(config.breach_threshold, 0.2);
        assert_eq!(config.required_frames, 4);
        assert_eq!(config.min_blob_area, 800);
        assert_eq!(config.frame_diff_pixel_threshold, 25);
    }

    #[test]
    fn no_region_reports_idle() {
        let mut pipeline = BreachPipeline::new(PipelineConfig::default()).unwrap();
        let analysis = pipeline.process_frame(&intruder_frame());
        assert!(!analysis.breach_state);
        assert_eq!(analysis.motion_ratio, 0.0);
        assert!(analysis.region_mask.is_none());
        assert_eq!(analysis.phase, BreachPhase::Clear);
        assert_eq!(pipeline.frames_processed(), 1);
    }

    #[test]
    fn quiet_scene_never_breaches() {
        let mut pipeline = warm_pipeline();
        for _ in 0..20 {
            let analysis = pipeline.process_frame(&empty_frame());
            assert!(!analysis.verdict);
            assert_eq!(analysis.motion_ratio, 0.0);
            assert!(!analysis.breach_state);
        }
    }

    #[test]
    fn intrusion_raises_then_clears_breach() {
        let mut pipeline = warm_pipeline();
        let required = pipeline.config().required_frames;

        for frame in 1..=required {
            let analysis = pipeline.process_frame(&intruder_frame());
            assert!(analysis.verdict);
            assert_eq!(analysis.blob_count, 1);
            assert!(analysis.motion_ratio > 0.35 && analysis.motion_ratio <= 0.36);
            if frame < required {
                assert!(!analysis.breach_state, "breached early on frame {frame}");
                assert_eq!(analysis.transition, None);
            } else {
                assert!(analysis.breach_state);
                assert_eq!(analysis.transition, Some(BreachTransition::Started));
            }
        }
        assert!((pipeline.last_motion_ratio() - 0.3588).abs() < 0.01);

        for frame in 1..=required {
            let analysis = pipeline.process_frame(&empty_frame());
            assert!(!analysis.verdict);
            if frame < required {
                assert!(analysis.breach_state, "cleared early on quiet frame {frame}");
            } else {
                assert!(!analysis.breach_state);
                assert_eq!(analysis.transition, Some(BreachTransition::Cleared));
            }
        }
    }

    #[test]
    fn first_object_frame_corroborates_with_difference() {
        let mut pipeline = warm_pipeline();
        pipeline.process_frame(&empty_frame());
        let analysis = pipeline.process_frame(&intruder_frame());
        assert!(analysis.diff_flag);
        assert_eq!(analysis.criteria.votes(), 3);

        // The object is now still, so only the background signal remains.
        let analysis = pipeline.process_frame(&intruder_frame());
        assert!(!analysis.diff_flag);
        assert_eq!(analysis.criteria.votes(), 2);
    }

    #[test]
    fn first_frame_after_region_reset_has_no_difference() {
        let mut pipeline = warm_pipeline();
        pipeline.process_frame(&empty_frame());
        pipeline.process_frame(&empty_frame());

        pipeline.clear_region();
        pipeline.set_region(region());
        let analysis = pipeline.process_frame(&intruder_frame());
        assert!(!analysis.diff_flag);
    }

    #[test]
    fn clear_region_forces_clear() {
        let mut pipeline = warm_pipeline();
        for _ in 0..6 {
            pipeline.process_frame(&intruder_frame());
        }
        assert!(pipeline.is_breached());

        assert!(pipeline.clear_region());
        assert!(!pipeline.is_breached());
        assert_eq!(pipeline.breach_counter(), 0);
        assert_eq!(pipeline.phase(), BreachPhase::Clear);
        assert!(pipeline.region().is_none());

        assert!(!pipeline.clear_region());
        assert_eq!(pipeline.breach_counter(), 0);
    }

    #[test]
    fn rejected_region_keeps_previous() {
        let mut pipeline = warm_pipeline();
        let err = pipeline.set_region_rect(10, 10, 15, 50).unwrap_err();
        assert!(matches!(err, SentinelError::InvalidRegion { width: 15, height: 50, .. }));
        assert_eq!(pipeline.region(), Some(&region()));

        let mut empty = BreachPipeline::new(PipelineConfig::default()).unwrap();
        assert!(empty.set_region_rect(10, 10, 15, 50).is_err());
        assert!(empty.region().is_none());
    }

    #[test]
    fn region_outside_frame_is_degenerate() {
        let mut pipeline = BreachPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.set_region(ProtectedRegion::new(500, 500, 100, 100).unwrap());
        for _ in 0..3 {
            let analysis = pipeline.process_frame(&intruder_frame());
            assert_eq!(analysis.motion_ratio, 0.0);
            assert!(!analysis.diff_flag);
            assert!(!analysis.verdict);
        }
    }

    #[test]
    fn shrinking_frame_does_not_compare_stale_buffers() {
        let mut pipeline = warm_pipeline();
        pipeline.process_frame(&empty_frame());

        let smaller = RgbImage::from_pixel(120, 90, Rgb([250, 250, 250]));
        let analysis = pipeline.process_frame(&smaller);
        assert!(!analysis.diff_flag);
        assert!(!analysis.verdict);
        assert_eq!(analysis.motion_ratio, 0.0);
    }

    #[test]
    fn resize_with_region_inside_both_frames_is_not_a_detection() {
        let mut pipeline = warm_pipeline();
        pipeline.process_frame(&empty_frame());

        let larger = RgbImage::from_pixel(320, 240, Rgb([220, 220, 220]));
        let analysis = pipeline.process_frame(&larger);
        assert!(!analysis.diff_flag);
        assert!(!analysis.verdict);
        assert_eq!(analysis.motion_ratio, 0.0);
        assert_eq!(analysis.breach_counter, 0);
        assert_eq!(analysis.criteria.votes(), 0);

        // The resized frame becomes the new baseline for both signals.
        let analysis = pipeline.process_frame(&larger);
        assert!(!analysis.diff_flag);
        assert!(!analysis.verdict);
        assert_eq!(analysis.motion_ratio, 0.0);
        assert!(analysis.region_mask.is_some());
    }

    #[test]
    fn resize_leaves_breach_counter_untouched() {
        let mut pipeline = warm_pipeline();
        pipeline.process_frame(&intruder_frame());
        pipeline.process_frame(&intruder_frame());
        assert_eq!(pipeline.breach_counter(), 2);

        let larger = RgbImage::from_pixel(320, 240, Rgb([40, 40, 40]));
        let analysis = pipeline.process_frame(&larger);
        assert!(!analysis.verdict);
        assert_eq!(analysis.transition, None);
        assert_eq!(pipeline.breach_counter(), 2);
        assert_eq!(pipeline.phase(), BreachPhase::Accumulating);
    }

    #[test]
    fn state_can_be_driven_directly() {
        let config = PipelineConfig::default();
        let mut state = DetectorState::new(&config);
        let region = region();
        analyze_frame(&mut state, &empty_frame(), None, &config);
        analyze_frame(&mut state, &empty_frame(), Some(&region), &config);
        let analysis = analyze_frame(&mut state, &intruder_frame(), Some(&region), &config);
        assert_eq!(analysis.frame_index, 2);
        assert_eq!(state.breach_counter(), 1);
        assert_eq!(state.phase(), BreachPhase::Accumulating);
    }
}
