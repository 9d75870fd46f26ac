// THEORY:
// The error surface of the engine is narrow. The per-frame pipeline
// is a numeric computation over frames that are already valid, so conditions like
// a resolution change or a zero-area region are absorbed locally (ratio 0, verdict
// false) and never reach the caller. Only mistakes the caller can act on, such as a
// protected region that is too small, are surfaced here.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SentinelError {
    /// The rectangle is not strictly larger than the minimum side length on both axes.
    #[error("protected region {width}x{height} is too small (both sides must exceed {min} px)")]
    InvalidRegion { width: u32, height: u32, min: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The monitor task has exited and no longer accepts commands.
    #[error("breach monitor is no longer running")]
    MonitorStopped,
}

pub type Result<T> = std::result::Result<T, SentinelError>;
