// THEORY:
// This file is the main entry point for the `stow_scan` library crate, a
// Stop-and-Scan motion tracker for a legged robot. The public API is the
// `StowScanController` state machine and the `TrackingSession` that runs it on
// a worker task, together with the three seams the controller is built from:
// a `MotionDetector`, a `MotorActuator` and a `SettingsStore`.
//
// The vision stages behind the detector live in `core_modules` and are public
// for callers that want to inspect or reuse them, but most users only need
// the re-exports below.

pub mod actuator;
pub mod clock;
pub mod controller;
pub mod core_modules;
pub mod error;
pub mod session;
pub mod settings;
pub mod status;

pub use actuator::{HaltGate, JsonLineActuator, LogActuator, MotorActuator, MotorCommand, RecordingActuator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{FrameOutcome, StowScanController, steering_commands};
pub use core_modules::intensity::frame_from_rgba;
pub use core_modules::motion_detector::{
    AdvancedMotionDetector, BasicMotionDetector, DetectorKind, MotionDetector, MotionObservation,
};
pub use core_modules::motion_region::BoundingBox;
pub use error::{ActuationError, ConfigError, DetectionError, SessionError};
pub use session::{FrameFeed, SessionConfig, StopHandle, TrackingSession};
pub use settings::{MotionSettings, PRESET_NAMES, SettingsStore, TuningParameters, preset};
pub use status::{ControllerState, ControllerStatus, FaultKind, StatusHandle, TrackingFault};
