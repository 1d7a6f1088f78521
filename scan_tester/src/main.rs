use std::env;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use stow_scan::{
    BoundingBox, ControllerState, ControllerStatus, DetectorKind, JsonLineActuator, LogActuator,
    MotionSettings, MotorActuator, SessionConfig, SettingsStore, TrackingSession,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];
const STATUS_WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: scan_tester <frames_dir> [annotated_output_dir]");
        return Ok(());
    }
    let input_dir = PathBuf::from(&args[1]);
    let output_dir = args.get(2).map(PathBuf::from);
    if let Some(dir) = &output_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let frames = list_frames(&input_dir)?;
    if frames.is_empty() {
        bail!("no image frames found in {}", input_dir.display());
    }
    info!(count = frames.len(), dir = %input_dir.display(), "replaying frames");

    // --- 2. Settings ---
    let mut settings = match env::var("SCAN_SETTINGS_PATH") {
        Ok(path) => MotionSettings::open(path)?,
        Err(_) => MotionSettings::new(),
    };
    if let Ok(name) = env::var("SCAN_PRESET") {
        settings
            .apply_preset(&name)
            .with_context(|| format!("applying preset {name}"))?;
        info!(preset = %name, "preset applied");
    }
    let params = settings.snapshot();

    let detector_kind: DetectorKind = env::var("SCAN_DETECTOR")
        .ok()
        .map(|s| s.parse::<DetectorKind>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or_default();

    // --- 3. Actuator ---
    let actuator: Arc<dyn MotorActuator> = match env::var("SCAN_WIRE_OUT") {
        Ok(path) => {
            let file = File::create(&path).with_context(|| format!("creating {path}"))?;
            info!(path = %path, "writing motor commands as JSON lines");
            Arc::new(JsonLineActuator::new(BufWriter::new(file)))
        }
        Err(_) => Arc::new(LogActuator),
    };

    // --- 4. Tracking Session ---
    let session_config = SessionConfig::from_env();
    info!(?session_config, detector = %detector_kind, "session config");
    let session = TrackingSession::spawn(
        detector_kind.create(&params),
        actuator,
        &params,
        session_config,
    );
    let feed = session.feed();
    let mut status = session.status();

    // --- 5. Main Processing Loop ---
    let mut last = status.snapshot();
    for (index, path) in frames.iter().enumerate() {
        let frame = match image::open(path) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable frame");
                continue;
            }
        };

        feed.send(frame.clone()).await?;
        last = match tokio::time::timeout(STATUS_WAIT, status.changed()).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                warn!("tracking session ended early");
                break;
            }
            Err(_) => bail!("no status for frame {index} after {STATUS_WAIT:?}"),
        };

        // --- 6. Visualization ---
        if let Some(dir) = &output_dir {
            let annotated = annotate(&frame, &last);
            let out = dir.join(format!("frame_{index:05}.png"));
            annotated
                .save(&out)
                .with_context(|| format!("writing {}", out.display()))?;
        }

        if last.state == ControllerState::Dormant {
            warn!(error = ?last.last_error, "tracking halted");
            break;
        }
    }

    // --- 7. Shutdown ---
    if session.stop(Duration::from_secs(2)).await.is_none() {
        warn!("session did not shut down cleanly");
    }
    println!("{}", serde_json::to_string_pretty(&last)?);
    Ok(())
}

/// Colored output for humans, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stow_scan=info,scan_tester=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

/// Image files in `dir`, sorted by name.
fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_frame {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

/// Draws the tracked region and a state marker onto a copy of the frame.
fn annotate(frame: &DynamicImage, status: &ControllerStatus) -> RgbImage {
    let mut canvas = frame.to_rgb8();

    let color = match status.state {
        ControllerState::Moving => Rgb([255, 0, 0]),
        ControllerState::SettlingBeforeScan => Rgb([255, 200, 0]),
        ControllerState::Dormant => Rgb([128, 128, 128]),
        ControllerState::Initializing | ControllerState::Scanning => Rgb([0, 255, 0]),
    };

    if let Some(rect) = status.bounding_box.and_then(to_rect) {
        draw_hollow_rect_mut(&mut canvas, rect, color);
    }
    // State marker in the top-left corner.
    draw_filled_rect_mut(&mut canvas, Rect::at(2, 2).of_size(8, 8), color);
    canvas
}

/// `None` for an empty box, which `Rect` cannot represent.
fn to_rect(bbox: BoundingBox) -> Option<Rect> {
    if bbox.width == 0 || bbox.height == 0 {
        return None;
    }
    Some(Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width, bbox.height))
}
