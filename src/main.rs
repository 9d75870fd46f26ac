// Example runner for the `perimeter_vision` library: replays a directory of still
// frames (in file-name order) through a `BreachMonitor`, logging every breach edge.

use anyhow::{Context, bail};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use perimeter_vision::core_modules::image_helper::image_helper::{mask_file_name, save_mask};
use perimeter_vision::{BreachMonitor, BreachTransition, PipelineConfig, ProtectedRegion};
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Flags sustained intrusions into a protected region of a frame sequence"
)]
struct Args {
    /// Directory of frames, processed in file-name order.
    frames: PathBuf,

    /// Protected region as x,y,width,height (both sides must exceed 20 px).
    #[arg(long)]
    region: Option<ProtectedRegion>,

    /// JSON file with pipeline options; missing keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `breach_threshold`.
    #[arg(long)]
    threshold: Option<f64>,

    /// Overrides `required_frames`.
    #[arg(long)]
    required_frames: Option<u32>,

    /// Writes each frame's cleaned region mask into this directory.
    #[arg(long)]
    dump_masks: Option<PathBuf>,
}

fn load_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.breach_threshold = threshold;
    }
    if let Some(required_frames) = args.required_frames {
        config.required_frames = required_frames;
    }
    config.validate()?;
    Ok(config)
}

fn list_frames(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read frame directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    frames.sort();
    Ok(frames)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let frames = list_frames(&args.frames)?;
    if frames.is_empty() {
        bail!("no frames found in {}", args.frames.display());
    }
    if let Some(dir) = &args.dump_masks {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create mask directory {}", dir.display()))?;
    }

    info!(
        "Replaying {} frames (threshold {:.0}%, {} frames to trigger)",
        frames.len(),
        config.breach_threshold * 100.0,
        config.required_frames
    );

    let (monitor, mut events) = BreachMonitor::spawn(config)?;
    match args.region {
        Some(region) => monitor.set_region(region).await?,
        None => warn!("No --region given; frames will only train the background model"),
    }

    let alarms = tokio::spawn(async move {
        let mut breaches = 0u32;
        while let Some(event) = events.recv().await {
            match event.kind {
                BreachTransition::Started => {
                    breaches += 1;
                    warn!(
                        "ALARM! Breach detected at frame {} (motion {:.1}%)",
                        event.frame_index,
                        event.motion_ratio * 100.0
                    );
                }
                BreachTransition::Cleared => {
                    info!("Region clear again at frame {}", event.frame_index)
                }
            }
        }
        breaches
    });

    for path in &frames {
        let frame = image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();
        let analysis = monitor.analyze(frame).await?;

        if let (Some(dir), Some(mask)) = (&args.dump_masks, &analysis.region_mask) {
            let target = dir.join(mask_file_name(analysis.frame_index));
            save_mask(&target, mask)
                .with_context(|| format!("failed to write mask {}", target.display()))?;
        }
    }

    let status = monitor.snapshot().await?;
    monitor.shutdown().await;
    let breaches = alarms.await?;

    info!(
        "Processed {} frames: {} breach(es), final state {:?}, last motion {:.1}%",
        status.frames_processed,
        breaches,
        status.phase,
        status.motion_ratio * 100.0
    );
    Ok(())
}
