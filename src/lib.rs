// THEORY:
// This file is the main entry point for the `perimeter_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (capture loops, alarm front-ends).
//
// The primary goal is to export the `BreachPipeline` and its associated data
// structures (`PipelineConfig`, `FrameAnalysis`, etc.) as the high-level interface
// for the breach engine, plus the `BreachMonitor` for hosts that capture on a
// different task than they analyze. The individual analyzers live in
// `core_modules` and stay usable on their own for testing and tuning.

pub mod core_modules;
pub mod error;
pub mod monitor;
pub mod pipeline;

pub use core_modules::region::ProtectedRegion;
pub use error::{Result, SentinelError};
pub use monitor::{BreachEvent, BreachMonitor, MonitorStatus};
pub use pipeline::{
    BreachPhase, BreachPipeline, BreachTransition, DetectorState, FrameAnalysis, PipelineConfig,
    analyze_frame,
};
