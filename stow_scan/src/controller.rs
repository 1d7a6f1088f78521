// THEORY:
// The `StowScanController` is the brain of Stop-and-Scan. A walking robot
// cannot tell its own motion from motion in the scene, so the controller never
// looks while it walks: it alternates between a stationary scan, where the
// detector watches for change against a learned background, and a blind, timed
// move toward whatever it last saw.
//
// State machine:
//
//   Dormant --start()--> Initializing
//   Initializing --(background primed)--> Scanning
//   Scanning --(qualifying motion)--> Moving
//   Moving --(movement_duration elapsed)--> SettlingBeforeScan
//   SettlingBeforeScan --(background_reset_time elapsed)--> Scanning
//   any --stop()--> Dormant
//
// Key architectural principles:
// 1.  **Frame-driven**: nothing happens between frames. Every timer is checked
//     when a frame arrives, against an injected `Clock`, so the controller can
//     be driven deterministically in tests and never sleeps.
// 2.  **Commands per transition**: motor commands are issued once, on the
//     transition that needs them, never repeated per frame.
// 3.  **Background hygiene**: the background model is thrown away after every
//     move. Scanning resumes only once the robot has settled, and the first
//     frame after that primes a fresh model.
// 4.  **Fault classes**: detection faults cost a frame. A failed move command
//     degrades the status but the move still happens. A failed stop at the end
//     of a move is fatal and parks the controller in `Dormant`.

use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::actuator::{MotorActuator, MotorCommand};
use crate::clock::Clock;
use crate::core_modules::motion_detector::{MotionDetector, MotionObservation};
use crate::error::{ActuationError, ConfigError, DetectionError};
use crate::settings::{SettingsStore, TuningParameters};
use crate::status::{ControllerState, ControllerStatus, FaultKind, StatusHandle, TrackingFault};

/// What a single call to `on_frame` did.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The controller is dormant; the frame was ignored.
    Idle,
    /// The frame primed a fresh background model.
    Primed,
    /// Scanned, nothing qualifying in view.
    NoMotion,
    /// Scanned, nothing in view, and a full pause elapsed.
    ScanCycleReset,
    /// Motion found; these commands were dispatched and a move began.
    MoveStarted {
        commands: Vec<MotorCommand>,
        observation: MotionObservation,
    },
    /// Mid-move; the frame was not analysed.
    StillMoving,
    /// The move timed out and the robot was stopped.
    MoveFinished,
    /// Waiting for the robot to settle.
    Settling,
    /// The settle finished; the next frame primes a new background.
    ScanResumed,
    /// The detector rejected the frame.
    DetectionFault(DetectionError),
    /// Stopping the robot failed; the controller is now dormant.
    Halted(ActuationError),
}

pub struct StowScanController {
    detector: Box<dyn MotionDetector>,
    actuator: Arc<dyn MotorActuator>,
    clock: Arc<dyn Clock>,
    params: TuningParameters,
    state: ControllerState,
    /// Start of the current move, or of the current settle.
    phase_started: Instant,
    /// Start of the current scan cycle.
    cycle_started: Instant,
    scan_cycles: u64,
    last_observation: MotionObservation,
    last_error: Option<TrackingFault>,
    status_tx: watch::Sender<ControllerStatus>,
}

impl StowScanController {
    pub fn new(
        detector: Box<dyn MotionDetector>,
        actuator: Arc<dyn MotorActuator>,
        clock: Arc<dyn Clock>,
        params: &TuningParameters,
    ) -> Self {
        let now = clock.now();
        let (status_tx, _) = watch::channel(ControllerStatus::default());
        let mut controller = Self {
            detector,
            actuator,
            clock,
            params: params.clone(),
            state: ControllerState::Dormant,
            phase_started: now,
            cycle_started: now,
            scan_cycles: 0,
            last_observation: MotionObservation::none(),
            last_error: None,
            status_tx,
        };
        controller.detector.configure(params);
        controller.publish();
        controller
    }

    /// Activates tracking. Also resumes a controller that was stopped.
    pub fn start(&mut self) {
        if self.state.is_active() {
            debug!(state = ?self.state, "start ignored, already tracking");
            return;
        }
        let now = self.clock.now();
        self.detector.reset();
        self.state = ControllerState::Initializing;
        self.cycle_started = now;
        self.phase_started = now;
        self.last_observation = MotionObservation::none();
        self.last_error = None;
        info!(detector = self.detector.name(), "stop-and-scan tracking started");
        self.publish();
    }

    /// Stops the robot, releases the background model and goes dormant.
    /// The controller is dormant even when a stop command fails.
    pub fn stop(&mut self) -> Result<(), ActuationError> {
        let result = self.issue_stop_pair();
        self.detector.reset();
        self.state = ControllerState::Dormant;
        self.last_observation = MotionObservation::none();
        match &result {
            Ok(()) => info!("stop-and-scan tracking stopped"),
            Err(err) => {
                error!(error = %err, "stop command failed while stopping tracking");
                self.last_error = Some(TrackingFault::actuation(err, true));
            }
        }
        self.publish();
        result
    }

    /// Swaps in a new parameter snapshot. Applies from the next frame.
    pub fn reload(&mut self, params: &TuningParameters) -> Result<(), ConfigError> {
        params.validate()?;
        self.params = params.clone();
        self.detector.configure(params);
        info!(
            movement_duration = params.movement_duration,
            pause_duration = params.pause_duration,
            min_area = params.min_area,
            "tuning parameters reloaded"
        );
        Ok(())
    }

    pub fn reload_from(&mut self, store: &dyn SettingsStore) -> Result<(), ConfigError> {
        self.reload(&store.snapshot())
    }

    pub fn params(&self) -> &TuningParameters {
        &self.params
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn status(&self) -> ControllerStatus {
        let detected = self.last_observation.detected;
        ControllerStatus {
            state: self.state,
            motion_detected: detected,
            centroid: detected.then_some(self.last_observation.centroid),
            area: self.last_observation.area,
            bounding_box: detected.then_some(self.last_observation.bounding_box),
            is_moving: self.state == ControllerState::Moving,
            scan_cycles: self.scan_cycles,
            detector: self.detector.name().to_string(),
            last_error: self.last_error.clone(),
        }
    }

    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle::new(self.status_tx.subscribe())
    }

    /// Processes one frame according to the current state.
    pub fn on_frame(&mut self, frame: &DynamicImage) -> FrameOutcome {
        let outcome = match self.state {
            ControllerState::Dormant => FrameOutcome::Idle,
            ControllerState::Moving => self.check_move(),
            ControllerState::SettlingBeforeScan => self.check_settle(),
            ControllerState::Initializing | ControllerState::Scanning => self.scan(frame),
        };
        self.publish();
        outcome
    }

    fn check_move(&mut self) -> FrameOutcome {
        let now = self.clock.now();
        if now.duration_since(self.phase_started) < self.params.movement_duration() {
            return FrameOutcome::StillMoving;
        }

        if let Err(err) = self.issue_stop_pair() {
            error!(error = %err, "failed to stop after move, tracking halted");
            self.detector.reset();
            self.state = ControllerState::Dormant;
            self.last_observation = MotionObservation::none();
            self.last_error = Some(TrackingFault::actuation(&err, true));
            return FrameOutcome::Halted(err);
        }

        self.state = ControllerState::SettlingBeforeScan;
        self.phase_started = now;
        info!(
            settle_secs = self.params.background_reset_time,
            "move finished, settling before scan"
        );
        FrameOutcome::MoveFinished
    }

    fn check_settle(&mut self) -> FrameOutcome {
        let now = self.clock.now();
        if now.duration_since(self.phase_started) < self.params.background_reset_time() {
            return FrameOutcome::Settling;
        }

        self.detector.reset();
        self.state = ControllerState::Scanning;
        self.cycle_started = now;
        self.last_observation = MotionObservation::none();
        info!("settled, background invalidated, scanning");
        FrameOutcome::ScanResumed
    }

    fn scan(&mut self, frame: &DynamicImage) -> FrameOutcome {
        let was_primed = self.detector.is_primed();
        let observation = match self.detector.detect(frame) {
            Ok(observation) => observation,
            Err(err) => return self.detection_fault(err),
        };

        if self.last_error.as_ref().is_some_and(|f| f.kind == FaultKind::Detection) {
            self.last_error = None;
        }
        self.last_observation = observation;
        let now = self.clock.now();

        if !was_primed && self.detector.is_primed() {
            if self.state == ControllerState::Initializing {
                self.state = ControllerState::Scanning;
                info!("background primed, scanning");
            }
            self.cycle_started = now;
            return FrameOutcome::Primed;
        }

        if observation.detected {
            return self.begin_move(frame.dimensions(), observation, now);
        }

        if now.duration_since(self.cycle_started) >= self.params.pause_duration() {
            self.cycle_started = now;
            self.scan_cycles += 1;
            debug!(scan_cycles = self.scan_cycles, "no motion, scan cycle reset");
            return FrameOutcome::ScanCycleReset;
        }
        FrameOutcome::NoMotion
    }

    fn detection_fault(&mut self, err: DetectionError) -> FrameOutcome {
        warn!(error = %err, "frame skipped");
        if matches!(err, DetectionError::FrameSizeMismatch { .. }) {
            self.detector.reset();
        }
        self.last_observation = MotionObservation::none();
        self.last_error = Some(TrackingFault::detection(&err));
        FrameOutcome::DetectionFault(err)
    }

    fn begin_move(
        &mut self,
        (width, height): (u32, u32),
        observation: MotionObservation,
        now: Instant,
    ) -> FrameOutcome {
        let commands = steering_commands(&self.params, (width, height), observation.centroid);
        info!(
            cx = observation.centroid.0,
            cy = observation.centroid.1,
            area = observation.area,
            ?commands,
            "motion detected, moving toward target"
        );

        let mut dispatched_cleanly = true;
        for &command in &commands {
            if let Err(err) = self.actuator.issue(command) {
                warn!(error = %err, "move command failed, continuing degraded");
                self.last_error = Some(TrackingFault::actuation(&err, false));
                dispatched_cleanly = false;
            }
        }
        if dispatched_cleanly && self.last_error.as_ref().is_some_and(|f| !f.fatal) {
            self.last_error = None;
        }

        self.state = ControllerState::Moving;
        self.phase_started = now;
        FrameOutcome::MoveStarted {
            commands,
            observation,
        }
    }

    /// Issues both stops, even if the first fails.
    fn issue_stop_pair(&self) -> Result<(), ActuationError> {
        let linear = self.actuator.issue(MotorCommand::StopLinear);
        let turn = self.actuator.issue(MotorCommand::StopTurn);
        linear.and(turn)
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }
}

/// Commands that point the robot at `centroid` in a `width` x `height` frame.
/// An offset exactly equal to the threshold counts as centred.
pub fn steering_commands(
    params: &TuningParameters,
    (width, height): (u32, u32),
    (cx, cy): (f64, f64),
) -> Vec<MotorCommand> {
    let threshold = params.movement_threshold as f64;
    let dx = cx - width as f64 / 2.0;
    let dy = cy - height as f64 / 2.0;

    let mut commands = Vec::with_capacity(2);
    commands.push(if dx.abs() > threshold {
        if dx > 0.0 { MotorCommand::TurnRight } else { MotorCommand::TurnLeft }
    } else {
        MotorCommand::Forward
    });
    if params.enable_vertical_movement && dy.abs() > threshold {
        commands.push(if dy > 0.0 { MotorCommand::LookDown } else { MotorCommand::LookUp });
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::RecordingActuator;
    use crate::clock::ManualClock;
    use crate::core_modules::motion_region::BoundingBox;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Detector double: primes on the first frame, then replays a script.
    struct ScriptedDetector {
        calls: Arc<AtomicUsize>,
        resets: Arc<AtomicUsize>,
        script: Arc<Mutex<VecDeque<Result<MotionObservation, DetectionError>>>>,
        primed: bool,
    }

    #[derive(Clone, Default)]
    struct DetectorScript {
        calls: Arc<AtomicUsize>,
        resets: Arc<AtomicUsize>,
        script: Arc<Mutex<VecDeque<Result<MotionObservation, DetectionError>>>>,
    }

    impl DetectorScript {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn resets(&self) -> usize {
            self.resets.load(Ordering::SeqCst)
        }

        fn queue(&self, result: Result<MotionObservation, DetectionError>) {
            self.script.lock().unwrap().push_back(result);
        }

        fn queue_target(&self, cx: f64, cy: f64) {
            self.queue(Ok(MotionObservation::at(
                (cx, cy),
                2500,
                BoundingBox { x: cx as u32 - 25, y: cy as u32 - 25, width: 50, height: 50 },
            )));
        }

        fn detector(&self) -> Box<dyn MotionDetector> {
            Box::new(ScriptedDetector {
                calls: self.calls.clone(),
                resets: self.resets.clone(),
                script: self.script.clone(),
                primed: false,
            })
        }
    }

    impl MotionDetector for ScriptedDetector {
        fn detect(&mut self, _frame: &DynamicImage) -> Result<MotionObservation, DetectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.primed {
                self.primed = true;
                return Ok(MotionObservation::none());
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(MotionObservation::none()))
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
            self.primed = false;
        }

        fn is_primed(&self) -> bool {
            self.primed
        }

        fn configure(&mut self, _params: &TuningParameters) {}

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct Rig {
        controller: StowScanController,
        script: DetectorScript,
        motors: Arc<RecordingActuator>,
        clock: Arc<ManualClock>,
        frame: DynamicImage,
    }

    impl Rig {
        fn new(params: TuningParameters) -> Self {
            let script = DetectorScript::default();
            let motors = Arc::new(RecordingActuator::new());
            let clock = Arc::new(ManualClock::new());
            let controller =
                StowScanController::new(script.detector(), motors.clone(), clock.clone(), &params);
            Self {
                controller,
                script,
                motors,
                clock,
                frame: DynamicImage::new_luma8(640, 480),
            }
        }

        fn frame(&mut self) -> FrameOutcome {
            self.controller.on_frame(&self.frame)
        }

        /// Starts tracking and feeds the priming frame.
        fn started() -> Self {
            let mut rig = Self::new(TuningParameters::default());
            rig.controller.start();
            assert_eq!(rig.frame(), FrameOutcome::Primed);
            rig
        }

        fn into_moving(&mut self, cx: f64, cy: f64) {
            self.script.queue_target(cx, cy);
            assert!(matches!(self.frame(), FrameOutcome::MoveStarted { .. }));
            assert_eq!(self.controller.state(), ControllerState::Moving);
        }
    }

    #[test]
    fn dormant_controller_ignores_frames() {
        let mut rig = Rig::new(TuningParameters::default());
        assert_eq!(rig.frame(), FrameOutcome::Idle);
        assert_eq!(rig.script.calls(), 0);
        assert!(rig.motors.issued().is_empty());
    }

    #[test]
    fn start_primes_then_scans() {
        let mut rig = Rig::new(TuningParameters::default());
        rig.controller.start();
        assert_eq!(rig.controller.state(), ControllerState::Initializing);
        assert_eq!(rig.frame(), FrameOutcome::Primed);
        assert_eq!(rig.controller.state(), ControllerState::Scanning);
        assert_eq!(rig.frame(), FrameOutcome::NoMotion);
    }

    #[test]
    fn pause_elapsing_resets_the_scan_cycle_without_commands() {
        let mut rig = Rig::started();
        rig.clock.advance_secs(0.5);
        assert_eq!(rig.frame(), FrameOutcome::NoMotion);
        rig.clock.advance_secs(0.6);
        assert_eq!(rig.frame(), FrameOutcome::ScanCycleReset);
        assert_eq!(rig.controller.status().scan_cycles, 1);
        rig.clock.advance_secs(0.5);
        assert_eq!(rig.frame(), FrameOutcome::NoMotion);
        assert!(rig.motors.issued().is_empty());
    }

    #[test]
    fn centred_target_goes_forward() {
        let mut rig = Rig::started();
        // 60 px right of centre: exactly on the threshold.
        rig.into_moving(380.0, 240.0);
        assert_eq!(rig.motors.issued(), vec![MotorCommand::Forward]);
    }

    #[test]
    fn offset_targets_turn_toward_them() {
        let mut rig = Rig::started();
        rig.into_moving(500.0, 240.0);
        assert_eq!(rig.motors.issued(), vec![MotorCommand::TurnRight]);

        let params = TuningParameters::default();
        assert_eq!(
            steering_commands(&params, (640, 480), (100.0, 240.0)),
            vec![MotorCommand::TurnLeft]
        );
        assert_eq!(
            steering_commands(&params, (640, 480), (259.0, 240.0)),
            vec![MotorCommand::TurnLeft]
        );
    }

    #[test]
    fn vertical_offsets_only_count_when_enabled() {
        let mut params = TuningParameters::default();
        assert_eq!(
            steering_commands(&params, (640, 480), (320.0, 400.0)),
            vec![MotorCommand::Forward]
        );
        params.enable_vertical_movement = true;
        assert_eq!(
            steering_commands(&params, (640, 480), (320.0, 400.0)),
            vec![MotorCommand::Forward, MotorCommand::LookDown]
        );
        assert_eq!(
            steering_commands(&params, (640, 480), (600.0, 50.0)),
            vec![MotorCommand::TurnRight, MotorCommand::LookUp]
        );
    }

    #[test]
    fn move_lasts_movement_duration_then_stops() {
        let mut rig = Rig::started();
        rig.into_moving(320.0, 240.0);
        rig.motors.clear();

        rig.clock.advance_secs(1.9);
        assert_eq!(rig.frame(), FrameOutcome::StillMoving);
        assert!(rig.controller.status().is_moving);

        rig.clock.advance_secs(0.2);
        assert_eq!(rig.frame(), FrameOutcome::MoveFinished);
        assert_eq!(rig.controller.state(), ControllerState::SettlingBeforeScan);
        assert_eq!(
            rig.motors.issued(),
            vec![MotorCommand::StopLinear, MotorCommand::StopTurn]
        );
    }

    #[test]
    fn no_detection_runs_while_moving_or_settling() {
        let mut rig = Rig::started();
        rig.into_moving(320.0, 240.0);
        let calls = rig.script.calls();

        for _ in 0..10 {
            rig.clock.advance_secs(0.1);
            rig.frame();
        }
        rig.clock.advance_secs(1.5);
        assert_eq!(rig.frame(), FrameOutcome::MoveFinished);
        rig.clock.advance_secs(0.2);
        assert_eq!(rig.frame(), FrameOutcome::Settling);

        assert_eq!(rig.script.calls(), calls);
    }

    #[test]
    fn move_commands_are_not_repeated_per_frame() {
        let mut rig = Rig::started();
        rig.into_moving(500.0, 240.0);
        for _ in 0..5 {
            rig.clock.advance_secs(0.1);
            rig.frame();
        }
        assert_eq!(rig.motors.issued(), vec![MotorCommand::TurnRight]);
    }

    #[test]
    fn resuming_after_a_move_rebuilds_the_background() {
        let mut rig = Rig::started();
        rig.into_moving(320.0, 240.0);
        rig.clock.advance_secs(2.0);
        assert_eq!(rig.frame(), FrameOutcome::MoveFinished);

        let resets = rig.script.resets();
        rig.clock.advance_secs(0.5);
        assert_eq!(rig.frame(), FrameOutcome::ScanResumed);
        assert_eq!(rig.script.resets(), resets + 1);
        assert_eq!(rig.controller.state(), ControllerState::Scanning);

        // Whatever the detector would have reported, the first frame back only primes.
        rig.script.queue_target(500.0, 240.0);
        assert_eq!(rig.frame(), FrameOutcome::Primed);
        assert!(matches!(rig.frame(), FrameOutcome::MoveStarted { .. }));
    }

    #[test]
    fn stop_issues_full_stop_and_goes_dormant() {
        let mut rig = Rig::started();
        rig.into_moving(500.0, 240.0);
        rig.motors.clear();

        rig.controller.stop().unwrap();
        assert_eq!(
            rig.motors.issued(),
            vec![MotorCommand::StopLinear, MotorCommand::StopTurn]
        );
        assert_eq!(rig.controller.state(), ControllerState::Dormant);

        rig.motors.clear();
        let calls = rig.script.calls();
        rig.script.queue_target(500.0, 240.0);
        for _ in 0..3 {
            rig.clock.advance_secs(1.0);
            assert_eq!(rig.frame(), FrameOutcome::Idle);
        }
        assert!(rig.motors.issued().is_empty());
        assert_eq!(rig.script.calls(), calls);
    }

    #[test]
    fn restart_after_stop_primes_again() {
        let mut rig = Rig::started();
        rig.controller.stop().unwrap();
        rig.controller.start();
        assert_eq!(rig.controller.state(), ControllerState::Initializing);
        assert_eq!(rig.frame(), FrameOutcome::Primed);
    }

    #[test]
    fn size_mismatch_skips_the_frame_and_reprimes() {
        let mut rig = Rig::started();
        rig.script.queue(Err(DetectionError::FrameSizeMismatch {
            expected: (640, 480),
            actual: (320, 240),
        }));

        assert!(matches!(rig.frame(), FrameOutcome::DetectionFault(_)));
        let status = rig.controller.status();
        assert_eq!(status.last_error.map(|f| f.kind), Some(FaultKind::Detection));
        assert_eq!(status.state, ControllerState::Scanning);

        assert_eq!(rig.frame(), FrameOutcome::Primed);
        assert_eq!(rig.controller.status().last_error, None);
    }

    #[test]
    fn failed_move_command_degrades_but_moves() {
        let mut rig = Rig::started();
        rig.motors.fail_on(MotorCommand::TurnRight);
        rig.script.queue_target(500.0, 240.0);

        assert!(matches!(rig.frame(), FrameOutcome::MoveStarted { .. }));
        let status = rig.controller.status();
        assert!(status.is_moving);
        let fault = status.last_error.unwrap();
        assert_eq!(fault.kind, FaultKind::Actuation);
        assert!(!fault.fatal);
    }

    #[test]
    fn failed_stop_after_move_halts_tracking() {
        let mut rig = Rig::started();
        rig.into_moving(320.0, 240.0);
        rig.motors.clear();
        rig.motors.fail_on(MotorCommand::StopLinear);

        rig.clock.advance_secs(2.0);
        assert!(matches!(rig.frame(), FrameOutcome::Halted(_)));

        // The second stop is still attempted.
        assert_eq!(rig.motors.issued(), vec![MotorCommand::StopTurn]);
        let status = rig.controller.status();
        assert_eq!(status.state, ControllerState::Dormant);
        assert!(status.last_error.unwrap().fatal);
        assert_eq!(rig.frame(), FrameOutcome::Idle);
    }

    #[test]
    fn reload_applies_new_timings() {
        let mut rig = Rig::started();
        rig.controller
            .reload(&TuningParameters {
                movement_duration: 0.5,
                ..TuningParameters::default()
            })
            .unwrap();
        rig.into_moving(320.0, 240.0);
        rig.clock.advance_secs(0.6);
        assert_eq!(rig.frame(), FrameOutcome::MoveFinished);
    }

    #[test]
    fn oversized_durations_never_panic_mid_move() {
        let mut rig = Rig::new(TuningParameters {
            movement_duration: 1e30,
            ..TuningParameters::default()
        });
        rig.controller.start();
        assert_eq!(rig.frame(), FrameOutcome::Primed);
        rig.into_moving(320.0, 240.0);

        rig.clock.advance_secs(3600.0);
        assert_eq!(rig.frame(), FrameOutcome::StillMoving);

        let err = rig.controller.reload(&TuningParameters {
            movement_duration: 1e30,
            ..TuningParameters::default()
        });
        assert!(err.is_err());
    }

    #[test]
    fn reload_rejects_invalid_parameters() {
        let mut rig = Rig::started();
        let err = rig.controller.reload(&TuningParameters {
            movement_duration: 0.0,
            ..TuningParameters::default()
        });
        assert!(err.is_err());
        assert_eq!(rig.controller.params().movement_duration, 2.0);
    }

    #[test]
    fn status_handle_sees_published_snapshots() {
        let mut rig = Rig::started();
        let handle = rig.controller.status_handle();
        rig.into_moving(500.0, 240.0);

        let status = handle.snapshot();
        assert_eq!(status.state, ControllerState::Moving);
        assert!(status.motion_detected);
        assert_eq!(status.centroid, Some((500.0, 240.0)));
        assert_eq!(status.area, 2500);
        assert_eq!(status.detector, "scripted");
    }
}
