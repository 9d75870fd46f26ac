// THEORY:
// The `BreachMonitor` is the host-side wrapper for applications that capture and
// analyze on different tasks. The engine itself has no locking and must see frames
// one at a time, in order. The monitor enforces that by giving a single actor task
// exclusive ownership of a `BreachPipeline` and talking to it only through a
// channel: whatever the number of producers, frames, region changes and queries
// are applied strictly in the order they were sent.
//
// Key architectural principles:
// 1.  **Single Consumer**: One task owns the pipeline. Producers hold a cheap
//     `BreachMonitor` handle that only sends messages.
// 2.  **Backpressure**: The command channel is bounded, so a fast camera waits for
//     the analyzer instead of queueing unbounded frames.
// 3.  **Edge Events**: The monitor reports only state changes (`Started`,
//     `Cleared`) on an event channel, mirroring an alarm that fires once when a
//     breach begins rather than on every breached frame.
// 4.  **Blocking Work Off the Reactor**: Analysis is CPU-bound, so the actor runs
//     on tokio's blocking pool and uses `blocking_recv`.

use crate::core_modules::region::ProtectedRegion;
use crate::error::{Result, SentinelError};
use crate::pipeline::{BreachPhase, BreachPipeline, BreachTransition, FrameAnalysis, PipelineConfig};
use image::RgbImage;
use log::{debug, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const COMMAND_CHANNEL_CAPACITY: usize = 10;

/// Message type for the monitor actor.
enum MonitorMessage {
    /// A frame, with an optional reply channel for the full analysis.
    Frame(RgbImage, Option<oneshot::Sender<FrameAnalysis>>),
    SetRegion(ProtectedRegion),
    ClearRegion,
    Snapshot(oneshot::Sender<MonitorStatus>),
    Shutdown,
}

/// Emitted when the breach state flips.
#[derive(Debug, Clone, PartialEq)]
pub struct BreachEvent {
    pub kind: BreachTransition,
    pub frame_index: u64,
    pub motion_ratio: f64,
    pub region: Option<ProtectedRegion>,
}

/// A point-in-time view of the monitor's pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStatus {
    pub region: Option<ProtectedRegion>,
    pub breach_state: bool,
    pub phase: BreachPhase,
    pub breach_counter: u32,
    pub motion_ratio: f64,
    pub frames_processed: u64,
}

impl MonitorStatus {
    fn of(pipeline: &BreachPipeline) -> Self {
        Self {
            region: pipeline.region().copied(),
            breach_state: pipeline.is_breached(),
            phase: pipeline.phase(),
            breach_counter: pipeline.breach_counter(),
            motion_ratio: pipeline.last_motion_ratio(),
            frames_processed: pipeline.frames_processed(),
        }
    }
}

/// Handle to a running monitor actor.
pub struct BreachMonitor {
    sender: mpsc::Sender<MonitorMessage>,
    task: JoinHandle<()>,
}

impl BreachMonitor {
    /// Starts the actor. Must be called from within a tokio runtime.
    pub fn spawn(config: PipelineConfig) -> Result<(Self, mpsc::UnboundedReceiver<BreachEvent>)> {
        let mut pipeline = BreachPipeline::new(config)?;
        let (sender, mut receiver) = mpsc::channel::<MonitorMessage>(COMMAND_CHANNEL_CAPACITY);
        let (event_sender, event_receiver) = mpsc::unbounded_channel::<BreachEvent>();

        let task = tokio::task::spawn_blocking(move || {
            while let Some(msg) = receiver.blocking_recv() {
                match msg {
                    MonitorMessage::Frame(frame, reply) => {
                        let analysis = pipeline.process_frame(&frame);
                        if let Some(kind) = analysis.transition {
                            let _ = event_sender.send(BreachEvent {
                                kind,
                                frame_index: analysis.frame_index,
                                motion_ratio: analysis.motion_ratio,
                                region: pipeline.region().copied(),
                            });
                        }
                        if let Some(reply) = reply {
                            let _ = reply.send(analysis);
                        }
                    }
                    MonitorMessage::SetRegion(region) => {
                        let previous = pipeline.region().copied();
                        let was_breached = pipeline.is_breached();
                        pipeline.set_region(region);
                        if was_breached {
                            let _ = event_sender.send(BreachEvent {
                                kind: BreachTransition::Cleared,
                                frame_index: pipeline.frames_processed(),
                                motion_ratio: 0.0,
                                region: previous,
                            });
                        }
                    }
                    MonitorMessage::ClearRegion => {
                        let previous = pipeline.region().copied();
                        if pipeline.clear_region() {
                            let _ = event_sender.send(BreachEvent {
                                kind: BreachTransition::Cleared,
                                frame_index: pipeline.frames_processed(),
                                motion_ratio: 0.0,
                                region: previous,
                            });
                        }
                    }
                    MonitorMessage::Snapshot(reply) => {
                        let _ = reply.send(MonitorStatus::of(&pipeline));
                    }
                    MonitorMessage::Shutdown => break,
                }
            }
            debug!("Breach monitor stopped after {} frames", pipeline.frames_processed());
        });

        info!("Breach monitor started");
        Ok((Self { sender, task }, event_receiver))
    }

    async fn send(&self, msg: MonitorMessage) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| SentinelError::MonitorStopped)
    }

    /// Queues a frame for analysis. Frames are analyzed in submission order.
    pub async fn submit(&self, frame: RgbImage) -> Result<()> {
        self.send(MonitorMessage::Frame(frame, None)).await
    }

    /// Analyzes a frame and waits for its full result.
    pub async fn analyze(&self, frame: RgbImage) -> Result<FrameAnalysis> {
        let (reply, response) = oneshot::channel();
        self.send(MonitorMessage::Frame(frame, Some(reply))).await?;
        response.await.map_err(|_| SentinelError::MonitorStopped)
    }

    pub async fn set_region(&self, region: ProtectedRegion) -> Result<()> {
        self.send(MonitorMessage::SetRegion(region)).await
    }

    /// Validates the rectangle before it reaches the actor; a rejected rectangle
    /// leaves the current region untouched.
    pub async fn set_region_rect(&self, x: u32, y: u32, width: u32, height: u32) -> Result<()> {
        let region = ProtectedRegion::new(x, y, width, height)?;
        self.set_region(region).await
    }

    pub async fn clear_region(&self) -> Result<()> {
        self.send(MonitorMessage::ClearRegion).await
    }

    /// Returns the state after every previously sent command has been applied.
    pub async fn snapshot(&self) -> Result<MonitorStatus> {
        let (reply, response) = oneshot::channel();
        self.send(MonitorMessage::Snapshot(reply)).await?;
        response.await.map_err(|_| SentinelError::MonitorStopped)
    }

    /// Stops the actor once it has drained the commands sent before this call.
    pub async fn shutdown(self) {
        let _ = self.sender.send(MonitorMessage::Shutdown).await;
        let _ = self.task.await;
    }
}
