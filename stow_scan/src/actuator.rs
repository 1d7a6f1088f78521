// THEORY:
// The `actuator` module is the seam between the tracking engine and the robot's
// legs. The engine only speaks a small directional vocabulary (`MotorCommand`);
// how a command reaches the hardware is the business of a `MotorActuator`
// implementation. Commands are fire-and-forget: an actuator either accepts a
// command or reports that it could not dispatch it, it never waits for the
// robot to acknowledge the motion.
//
// Implementations provided here:
// - `LogActuator`: writes each command to the log. Useful for dry runs.
// - `JsonLineActuator`: encodes commands as the JSON objects the robot's
//   serial firmware understands and writes them to any byte sink.
// - `RecordingActuator`: keeps every command in memory and can be told to fail
//   specific commands. Used by tests and offline replays.
// - `HaltGate`: wraps another actuator and, once halted, swallows every command
//   that would make the robot move. Stop commands always pass.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ActuationError;

/// The directional vocabulary understood by the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MotorCommand {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    StopLinear,
    StopTurn,
    LookUp,
    LookDown,
}

impl MotorCommand {
    /// Commands that bring the robot to rest rather than set it in motion.
    pub fn is_stop(self) -> bool {
        matches!(self, MotorCommand::StopLinear | MotorCommand::StopTurn)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MotorCommand::Forward => "forward",
            MotorCommand::Backward => "backward",
            MotorCommand::TurnLeft => "turnLeft",
            MotorCommand::TurnRight => "turnRight",
            MotorCommand::StopLinear => "stopLinear",
            MotorCommand::StopTurn => "stopTurn",
            MotorCommand::LookUp => "lookUp",
            MotorCommand::LookDown => "lookDown",
        }
    }
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can carry a `MotorCommand` to the robot.
///
/// Implementations must be cheap to call and must not block on the robot:
/// the tracking loop calls `issue` from its hot path.
pub trait MotorActuator: Send + Sync {
    fn issue(&self, command: MotorCommand) -> Result<(), ActuationError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// An actuator that only logs what it is asked to do.
#[derive(Debug, Default)]
pub struct LogActuator;

impl MotorActuator for LogActuator {
    fn issue(&self, command: MotorCommand) -> Result<(), ActuationError> {
        info!(%command, "motor command");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// One command in the robot firmware's serial format, e.g. `{"var":"move","val":1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WireCommand {
    pub var: &'static str,
    pub val: u8,
}

impl From<MotorCommand> for WireCommand {
    fn from(command: MotorCommand) -> Self {
        let (var, val) = match command {
            MotorCommand::Forward => ("move", 1),
            MotorCommand::TurnLeft => ("move", 2),
            MotorCommand::StopLinear => ("move", 3),
            MotorCommand::TurnRight => ("move", 4),
            MotorCommand::Backward => ("move", 5),
            MotorCommand::StopTurn => ("move", 6),
            MotorCommand::LookUp => ("ges", 1),
            MotorCommand::LookDown => ("ges", 2),
        };
        Self { var, val }
    }
}

/// Writes commands as newline-terminated JSON objects to a byte sink
/// (a serial port, a pipe, a file).
pub struct JsonLineActuator<W: Write + Send> {
    sink: Mutex<W>,
}

impl<W: Write + Send> JsonLineActuator<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Gives the sink back, e.g. to inspect what was written.
    pub fn into_inner(self) -> W {
        match self.sink.into_inner() {
            Ok(sink) => sink,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> MotorActuator for JsonLineActuator<W> {
    fn issue(&self, command: MotorCommand) -> Result<(), ActuationError> {
        let mut line = serde_json::to_vec(&WireCommand::from(command))
            .map_err(|e| ActuationError::dispatch(command, e.to_string()))?;
        line.push(b'\n');

        let mut sink = self.sink.lock().map_err(|_| ActuationError::Unavailable)?;
        sink.write_all(&line)
            .and_then(|_| sink.flush())
            .map_err(|e| ActuationError::dispatch(command, e.to_string()))?;
        debug!(%command, "wrote wire command");
        Ok(())
    }

    fn name(&self) -> &str {
        "json-line"
    }
}

/// Keeps every dispatched command in memory.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    issued: Mutex<Vec<MotorCommand>>,
    failing: Mutex<Vec<MotorCommand>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later dispatch of `command` fail.
    pub fn fail_on(&self, command: MotorCommand) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(command);
        }
    }

    /// Commands successfully dispatched so far, in order.
    pub fn issued(&self) -> Vec<MotorCommand> {
        self.issued.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut issued) = self.issued.lock() {
            issued.clear();
        }
    }
}

impl MotorActuator for RecordingActuator {
    fn issue(&self, command: MotorCommand) -> Result<(), ActuationError> {
        let fails = self
            .failing
            .lock()
            .map(|f| f.contains(&command))
            .unwrap_or(false);
        if fails {
            return Err(ActuationError::dispatch(command, "injected failure"));
        }
        self.issued
            .lock()
            .map_err(|_| ActuationError::Unavailable)?
            .push(command);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Swallows motion commands once halted. A halt is one-way.
pub struct HaltGate {
    inner: Arc<dyn MotorActuator>,
    halted: AtomicBool,
}

impl HaltGate {
    pub fn new(inner: Arc<dyn MotorActuator>) -> Self {
        Self {
            inner,
            halted: AtomicBool::new(false),
        }
    }

    /// Closes the gate and sends the full stop pair straight to the robot.
    pub fn halt(&self) -> Result<(), ActuationError> {
        self.halted.store(true, Ordering::SeqCst);
        let linear = self.inner.issue(MotorCommand::StopLinear);
        let turn = self.inner.issue(MotorCommand::StopTurn);
        linear.and(turn)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

impl MotorActuator for HaltGate {
    fn issue(&self, command: MotorCommand) -> Result<(), ActuationError> {
        if self.is_halted() && !command.is_stop() {
            debug!(%command, "gate halted, command dropped");
            return Ok(());
        }
        self.inner.issue(command)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
