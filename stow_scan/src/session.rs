// THEORY:
// A `TrackingSession` runs one `StowScanController` on its own tokio task so
// the camera side never waits on vision work. The task owns the controller
// outright; everything else talks to it through channels:
//
// - `FrameFeed`: a bounded mpsc of frames. When the worker falls behind, new
//   frames are refused rather than queued without limit. Frames are processed
//   strictly one at a time.
// - control messages (`reload`) travel over a second mpsc and are applied
//   between frames, never during one.
// - a `watch<bool>` carries cancellation, and the controller's own status
//   watch carries snapshots back out.
//
// Stopping has two halves. The `StopHandle` acts immediately: it flags
// cancellation and sends the full stop pair straight through the shared
// actuator, then closes a `HaltGate` so no motion command can slip out
// afterwards. The worker notices the flag after at most the frame it is on,
// issues its own final stop, releases the background and hands the controller
// back.

use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::actuator::{HaltGate, MotorActuator};
use crate::clock::{Clock, SystemClock};
use crate::controller::{FrameOutcome, StowScanController};
use crate::core_modules::intensity::frame_from_rgba;
use crate::core_modules::motion_detector::MotionDetector;
use crate::error::{ActuationError, ConfigError, SessionError};
use crate::settings::TuningParameters;
use crate::status::StatusHandle;

/// Worker pacing and buffering.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause after each processed frame.
    pub frame_interval: Duration,
    /// Frames that may wait in the feed before new ones are refused.
    pub feed_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(30),
            feed_capacity: 4,
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frame_interval: std::env::var("SCAN_FRAME_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.frame_interval),
            feed_capacity: std::env::var("SCAN_FEED_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.feed_capacity),
        }
    }
}

enum Control {
    Reload {
        params: TuningParameters,
        reply: oneshot::Sender<Result<(), ConfigError>>,
    },
}

/// Sending side of a session's frame channel.
#[derive(Debug, Clone)]
pub struct FrameFeed {
    sender: mpsc::Sender<DynamicImage>,
}

impl FrameFeed {
    /// Offers a frame without waiting. A busy worker refuses it.
    pub fn try_send(&self, frame: DynamicImage) -> Result<(), SessionError> {
        self.sender.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SessionError::FeedFull,
            mpsc::error::TrySendError::Closed(_) => SessionError::Stopped,
        })
    }

    /// Offers a raw RGBA capture buffer without waiting. A buffer too short
    /// for its dimensions is refused before it reaches the worker.
    pub fn try_send_rgba(&self, width: u32, height: u32, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.try_send(frame_from_rgba(width, height, bytes)?)
    }

    /// Waits for room in the feed.
    pub async fn send(&self, frame: DynamicImage) -> Result<(), SessionError> {
        self.sender
            .send(frame)
            .await
            .map_err(|_| SessionError::Stopped)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Cloneable, thread-safe halt trigger for a session.
#[derive(Clone)]
pub struct StopHandle {
    cancel: Arc<watch::Sender<bool>>,
    gate: Arc<HaltGate>,
}

impl StopHandle {
    /// Flags cancellation and stops the robot right away. Any motion command
    /// the worker issues afterwards is dropped.
    pub fn halt(&self) -> Result<(), ActuationError> {
        self.cancel.send_replace(true);
        self.gate.halt()
    }

    pub fn is_halted(&self) -> bool {
        self.gate.is_halted()
    }
}

pub struct TrackingSession {
    feed: FrameFeed,
    control: mpsc::Sender<Control>,
    stop: StopHandle,
    status: StatusHandle,
    worker: Option<JoinHandle<StowScanController>>,
}

impl TrackingSession {
    /// Starts tracking on a new worker task. Must be called from within a
    /// tokio runtime.
    pub fn spawn(
        detector: Box<dyn MotionDetector>,
        actuator: Arc<dyn MotorActuator>,
        params: &TuningParameters,
        config: SessionConfig,
    ) -> Self {
        Self::spawn_with_clock(detector, actuator, Arc::new(SystemClock), params, config)
    }

    pub fn spawn_with_clock(
        detector: Box<dyn MotionDetector>,
        actuator: Arc<dyn MotorActuator>,
        clock: Arc<dyn Clock>,
        params: &TuningParameters,
        config: SessionConfig,
    ) -> Self {
        let gate = Arc::new(HaltGate::new(actuator));
        let mut controller = StowScanController::new(detector, gate.clone(), clock, params);
        controller.start();
        let status = controller.status_handle();

        let (frame_tx, frame_rx) = mpsc::channel(config.feed_capacity.max(1));
        let (control_tx, control_rx) = mpsc::channel(8);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        info!(
            frame_interval_ms = config.frame_interval.as_millis() as u64,
            feed_capacity = config.feed_capacity,
            "tracking session started"
        );
        let worker = tokio::spawn(run_worker(
            controller,
            frame_rx,
            control_rx,
            cancel_rx,
            config.frame_interval,
        ));

        Self {
            feed: FrameFeed { sender: frame_tx },
            control: control_tx,
            stop: StopHandle {
                cancel: Arc::new(cancel_tx),
                gate,
            },
            status,
            worker: Some(worker),
        }
    }

    pub fn feed(&self) -> FrameFeed {
        self.feed.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(|w| w.is_finished())
    }

    /// Hands new tunables to the worker, applied before its next frame.
    pub async fn reload(&self, params: TuningParameters) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.control
            .send(Control::Reload { params, reply })
            .await
            .map_err(|_| SessionError::Stopped)?;
        response.await.map_err(|_| SessionError::Stopped)??;
        Ok(())
    }

    /// Halts the robot and waits up to `timeout` for the worker to finish.
    /// Returns the controller when the worker acknowledged in time.
    pub async fn stop(mut self, timeout: Duration) -> Option<StowScanController> {
        if let Err(err) = self.stop.halt() {
            error!(error = %err, "hard stop failed");
        }
        let worker = self.worker.take()?;
        match tokio::time::timeout(timeout, worker).await {
            Ok(Ok(controller)) => {
                info!("tracking session stopped");
                Some(controller)
            }
            Ok(Err(err)) => {
                error!(error = %err, "tracking worker panicked");
                None
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "tracking worker did not acknowledge stop in time");
                None
            }
        }
    }
}

async fn run_worker(
    mut controller: StowScanController,
    mut frames: mpsc::Receiver<DynamicImage>,
    mut control: mpsc::Receiver<Control>,
    mut cancel: watch::Receiver<bool>,
    frame_interval: Duration,
) -> StowScanController {
    loop {
        if *cancel.borrow() {
            debug!("cancellation observed");
            break;
        }

        tokio::select! {
            biased;
            changed = cancel.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(message) = control.recv() => match message {
                Control::Reload { params, reply } => {
                    let result = controller.reload(&params);
                    if let Err(err) = &result {
                        warn!(error = %err, "reload rejected");
                    }
                    let _ = reply.send(result);
                }
            },
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    debug!("frame feed closed");
                    break;
                };
                let outcome = controller.on_frame(&frame);
                if let FrameOutcome::Halted(err) = outcome {
                    error!(error = %err, "tracking halted by actuation fault");
                    break;
                }
                tokio::select! {
                    _ = cancel.changed() => {}
                    _ = tokio::time::sleep(frame_interval) => {}
                }
            }
        }
    }

    if let Err(err) = controller.stop() {
        warn!(error = %err, "final stop failed");
    }
    controller
}
