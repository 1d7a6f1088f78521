// THEORY:
// Every failure in the engine belongs to exactly one of three families, and the
// family decides what happens next:
// - `ConfigError` is reported to whoever changed a setting. A running session
//   never sees it until the operator reloads.
// - `DetectionError` costs one frame. The controller logs it and moves on.
// - `ActuationError` is either a degraded-but-running condition or the end of a
//   session, depending on which transition was dispatching the command.
// `SessionError` covers the plumbing around the worker task itself.

use thiserror::Error;

use crate::actuator::MotorCommand;

/// Errors raised by the settings store.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while turning a frame into a motion observation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("frame is {actual:?} but the background model is {expected:?}")]
    FrameSizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

/// Errors raised by a motor actuator when a command cannot be dispatched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActuationError {
    #[error("failed to dispatch {command}: {reason}")]
    Dispatch {
        command: MotorCommand,
        reason: String,
    },

    #[error("actuator link unavailable")]
    Unavailable,
}

impl ActuationError {
    pub fn dispatch(command: MotorCommand, reason: impl Into<String>) -> Self {
        Self::Dispatch {
            command,
            reason: reason.into(),
        }
    }
}

/// Errors raised by the tracking session handle.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("tracking session has already stopped")]
    Stopped,

    #[error("frame feed is full, frame dropped")]
    FeedFull,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Frame(#[from] DetectionError),
}
