// THEORY:
// The controller's status is published, not polled. Every processed frame ends
// with a fresh `ControllerStatus` pushed into a `tokio::sync::watch` channel;
// any number of observers hold a `StatusHandle` and read the latest snapshot
// from whatever thread they live on without ever touching the controller.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::core_modules::motion_region::BoundingBox;

/// The controller's phase. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    #[default]
    Dormant,
    Initializing,
    Scanning,
    Moving,
    SettlingBeforeScan,
}

impl ControllerState {
    pub fn is_active(self) -> bool {
        self != ControllerState::Dormant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Detection,
    Actuation,
}

/// The most recent fault the controller ran into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingFault {
    pub kind: FaultKind,
    pub message: String,
    /// A fatal fault ended the tracking session.
    pub fatal: bool,
}

impl TrackingFault {
    pub fn detection(err: impl ToString) -> Self {
        Self {
            kind: FaultKind::Detection,
            message: err.to_string(),
            fatal: false,
        }
    }

    pub fn actuation(err: impl ToString, fatal: bool) -> Self {
        Self {
            kind: FaultKind::Actuation,
            message: err.to_string(),
            fatal,
        }
    }
}

/// Point-in-time snapshot of the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub state: ControllerState,
    pub motion_detected: bool,
    pub centroid: Option<(f64, f64)>,
    pub area: u32,
    pub bounding_box: Option<BoundingBox>,
    pub is_moving: bool,
    pub scan_cycles: u64,
    pub detector: String,
    pub last_error: Option<TrackingFault>,
}

/// Read side of the controller's status channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    receiver: watch::Receiver<ControllerStatus>,
}

impl StatusHandle {
    pub(crate) fn new(receiver: watch::Receiver<ControllerStatus>) -> Self {
        Self { receiver }
    }

    pub fn snapshot(&self) -> ControllerStatus {
        self.receiver.borrow().clone()
    }

    /// Waits for the next published status. Returns `None` once the
    /// controller is gone.
    pub async fn changed(&mut self) -> Option<ControllerStatus> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
