// THEORY:
// The `settings` module owns the tunable numbers of the engine. It has two
// layers:
// 1.  `TuningParameters`: a plain, validated snapshot of every tunable. The
//     detector and the controller copy one of these at construction and on an
//     explicit reload. They never poll the store while frames are flowing.
// 2.  `SettingsStore`: the key/value interface an operator talks to. Writes go
//     through a candidate copy that is validated as a whole before it replaces
//     the live parameters, so a preset or a multi-key update either lands
//     completely or not at all.
//
// `MotionSettings` is the concrete store. It can live purely in memory or be
// backed by a JSON file, in which case the file is merged over the defaults on
// load and rewritten on every accepted change.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::error::ConfigError;

/// Upper bound on dilation passes. Each pass touches every pixel of the frame.
pub const MAX_DILATE_ITERATIONS: u32 = 64;

/// Names of the built-in presets, in display order.
pub const PRESET_NAMES: [&str; 5] = ["conservative", "balanced", "aggressive", "indoor", "outdoor"];

/// A complete, validated set of tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningParameters {
    /// Seconds spent moving toward a target before a forced stop.
    pub movement_duration: f64,
    /// Seconds between scan-cycle resets while nothing moves.
    pub pause_duration: f64,
    /// Seconds to let the robot settle before the background is rebuilt.
    pub background_reset_time: f64,
    /// Smallest foreground region, in pixels, that counts as motion.
    pub min_area: u32,
    /// Per-pixel intensity difference (0-255) above which a pixel is foreground.
    pub tracking_sensitivity: u32,
    /// Horizontal/vertical centroid offset, in pixels, that triggers a turn or look.
    pub movement_threshold: u32,
    /// Weight of the newest frame in the background average (0-1).
    pub background_learning_rate: f64,
    /// Gaussian kernel size. 0 or 1 disables blurring.
    pub gaussian_blur_size: u32,
    /// Passes of 3x3 dilation applied to the foreground mask.
    pub dilate_iterations: u32,
    /// Whether vertical offsets drive the camera servo up/down.
    pub enable_vertical_movement: bool,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            movement_duration: 2.0,
            pause_duration: 1.0,
            background_reset_time: 0.5,
            min_area: 1500,
            tracking_sensitivity: 20,
            movement_threshold: 60,
            background_learning_rate: 0.2,
            gaussian_blur_size: 21,
            dilate_iterations: 2,
            enable_vertical_movement: false,
        }
    }
}

impl TuningParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_seconds("movement_duration", self.movement_duration)?;
        if self.movement_duration <= 0.0 {
            return Err(ConfigError::invalid("movement_duration", "must be greater than zero"));
        }
        check_seconds("pause_duration", self.pause_duration)?;
        check_seconds("background_reset_time", self.background_reset_time)?;

        if self.min_area == 0 {
            return Err(ConfigError::invalid("min_area", "must be at least one pixel"));
        }
        if self.tracking_sensitivity > 255 {
            return Err(ConfigError::invalid("tracking_sensitivity", "must be within 0-255"));
        }
        if !(0.0..=1.0).contains(&self.background_learning_rate) {
            return Err(ConfigError::invalid("background_learning_rate", "must be within 0-1"));
        }
        if self.gaussian_blur_size > 1 && self.gaussian_blur_size % 2 == 0 {
            return Err(ConfigError::invalid("gaussian_blur_size", "must be odd"));
        }
        if self.dilate_iterations > MAX_DILATE_ITERATIONS {
            return Err(ConfigError::invalid(
                "dilate_iterations",
                format!("must be at most {MAX_DILATE_ITERATIONS}"),
            ));
        }
        Ok(())
    }

    pub fn movement_duration(&self) -> Duration {
        seconds(self.movement_duration)
    }

    pub fn pause_duration(&self) -> Duration {
        seconds(self.pause_duration)
    }

    pub fn background_reset_time(&self) -> Duration {
        seconds(self.background_reset_time)
    }
}

/// Converts validated seconds. Values that never went through `validate`
/// saturate instead of panicking: negative or NaN to zero, huge to `Duration::MAX`.
fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

fn check_seconds(key: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(key, "must be a finite, non-negative number of seconds"));
    }
    if Duration::try_from_secs_f64(value).is_err() {
        return Err(ConfigError::invalid(key, "is too large to be a duration"));
    }
    Ok(())
}

/// The bundle of settings a preset applies, or `None` for an unknown name.
pub fn preset(name: &str) -> Option<Map<String, Value>> {
    let bundle = match name {
        "conservative" => json!({
            "movement_duration": 1.5,
            "pause_duration": 1.5,
            "tracking_sensitivity": 25,
            "background_learning_rate": 0.15,
        }),
        "balanced" => json!({
            "movement_duration": 2.0,
            "pause_duration": 1.0,
            "tracking_sensitivity": 20,
            "background_learning_rate": 0.2,
        }),
        "aggressive" => json!({
            "movement_duration": 2.5,
            "pause_duration": 0.8,
            "tracking_sensitivity": 15,
            "background_learning_rate": 0.25,
        }),
        "indoor" => json!({
            "movement_duration": 1.8,
            "pause_duration": 1.2,
            "tracking_sensitivity": 22,
            "min_area": 1200,
            "background_learning_rate": 0.18,
        }),
        "outdoor" => json!({
            "movement_duration": 2.2,
            "pause_duration": 0.9,
            "tracking_sensitivity": 18,
            "min_area": 2000,
            "background_learning_rate": 0.22,
        }),
        _ => return None,
    };
    match bundle {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// The operator-facing settings interface.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Result<Value, ConfigError>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), ConfigError>;

    /// Applies a named preset atomically. Unknown names change nothing.
    fn apply_preset(&mut self, name: &str) -> Result<(), ConfigError>;

    /// Re-reads the backing source, if any.
    fn reload(&mut self) -> Result<(), ConfigError>;

    fn snapshot(&self) -> TuningParameters;
}

/// The default settings store: in memory, optionally mirrored to a JSON file.
#[derive(Debug, Clone, Default)]
pub struct MotionSettings {
    path: Option<PathBuf>,
    params: TuningParameters,
    /// Entries of the backing file that are not tunables. Written back
    /// untouched on every save.
    extras: Map<String, Value>,
}

impl MotionSettings {
    /// An in-memory store holding the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a file-backed store. A missing file is created with the defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let (params, extras) = if path.exists() {
            read_params(&path)?
        } else {
            let defaults = TuningParameters::default();
            write_params(&path, &defaults, &Map::new())?;
            info!(path = %path.display(), "created default motion settings file");
            (defaults, Map::new())
        };
        Ok(Self {
            path: Some(path),
            params,
            extras,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Updates several keys at once. All keys land, or none do.
    pub fn update(&mut self, changes: Map<String, Value>) -> Result<(), ConfigError> {
        let mut current = match serde_json::to_value(&self.params)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in changes {
            if !current.contains_key(&key) {
                return Err(ConfigError::UnknownKey(key));
            }
            current.insert(key, value);
        }

        let candidate: TuningParameters = serde_json::from_value(Value::Object(current))
            .map_err(|e| ConfigError::invalid("settings", e.to_string()))?;
        candidate.validate()?;
        self.commit(candidate)
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.commit(TuningParameters::default())
    }

    /// Writes the live parameters to the backing file, if there is one.
    pub fn save(&self) -> Result<(), ConfigError> {
        match &self.path {
            Some(path) => write_params(path, &self.params, &self.extras),
            None => Ok(()),
        }
    }

    fn commit(&mut self, candidate: TuningParameters) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            write_params(path, &candidate, &self.extras)?;
        }
        self.params = candidate;
        Ok(())
    }
}

impl SettingsStore for MotionSettings {
    fn get(&self, key: &str) -> Result<Value, ConfigError> {
        match serde_json::to_value(&self.params)? {
            Value::Object(mut map) => map
                .remove(key)
                .or_else(|| self.extras.get(key).cloned())
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string())),
            _ => Err(ConfigError::UnknownKey(key.to_string())),
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), ConfigError> {
        let mut change = Map::new();
        change.insert(key.to_string(), value);
        self.update(change)
    }

    fn apply_preset(&mut self, name: &str) -> Result<(), ConfigError> {
        let Some(bundle) = preset(name) else {
            warn!(preset = name, "unknown motion preset");
            return Err(ConfigError::UnknownPreset(name.to_string()));
        };
        self.update(bundle)?;
        info!(preset = name, "applied motion preset");
        Ok(())
    }

    fn reload(&mut self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            debug!("in-memory settings, nothing to reload");
            return Ok(());
        };
        let (params, extras) = read_params(path)?;
        self.params = params;
        self.extras = extras;
        info!(path = %path.display(), "motion settings reloaded");
        Ok(())
    }

    fn snapshot(&self) -> TuningParameters {
        self.params.clone()
    }
}

/// Reads a settings file, splitting it into the tunables (merged over the
/// defaults) and every other entry.
fn read_params(path: &Path) -> Result<(TuningParameters, Map<String, Value>), ConfigError> {
    let raw = fs::read_to_string(path)?;
    let stored: Map<String, Value> = serde_json::from_str(&raw)?;
    let known = match serde_json::to_value(TuningParameters::default())? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let mut tunables = Map::new();
    let mut extras = Map::new();
    for (key, value) in stored {
        if known.contains_key(&key) {
            tunables.insert(key, value);
        } else {
            extras.insert(key, value);
        }
    }

    let params: TuningParameters = serde_json::from_value(Value::Object(tunables))?;
    params.validate()?;
    Ok((params, extras))
}

fn write_params(
    path: &Path,
    params: &TuningParameters,
    extras: &Map<String, Value>,
) -> Result<(), ConfigError> {
    let mut merged = extras.clone();
    if let Value::Object(map) = serde_json::to_value(params)? {
        merged.extend(map);
    }
    fs::write(path, serde_json::to_string_pretty(&merged)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_preset_is_valid() {
        for name in PRESET_NAMES {
            let mut settings = MotionSettings::new();
            settings.apply_preset(name).unwrap();
            settings.snapshot().validate().unwrap();
        }
    }

    #[test]
    fn indoor_preset_changes_only_its_keys() {
        let mut settings = MotionSettings::new();
        settings.apply_preset("indoor").unwrap();
        let params = settings.snapshot();

        assert_eq!(params.min_area, 1200);
        assert_eq!(params.tracking_sensitivity, 22);
        assert_eq!(params.movement_duration, 1.8);
        assert_eq!(params.movement_threshold, 60);
        assert_eq!(params.gaussian_blur_size, 21);
    }

    #[test]
    fn unknown_preset_leaves_parameters_untouched() {
        let mut settings = MotionSettings::new();
        settings.set("min_area", json!(900)).unwrap();
        let before = settings.snapshot();

        let result = settings.apply_preset("turbo");

        assert!(matches!(result, Err(ConfigError::UnknownPreset(_))));
        assert_eq!(settings.snapshot(), before);
    }

    #[test]
    fn batch_with_one_bad_value_applies_nothing() {
        let mut settings = MotionSettings::new();
        let mut changes = Map::new();
        changes.insert("pause_duration".into(), json!(3.0));
        changes.insert("background_learning_rate".into(), json!(1.5));

        assert!(settings.update(changes).is_err());
        assert_eq!(settings.snapshot(), TuningParameters::default());
    }

    #[test]
    fn get_and_set_by_key() {
        let mut settings = MotionSettings::new();
        assert_eq!(settings.get("movement_threshold").unwrap(), json!(60));

        settings.set("enable_vertical_movement", json!(true)).unwrap();
        assert_eq!(settings.get("enable_vertical_movement").unwrap(), json!(true));

        assert!(matches!(settings.get("warp_factor"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            settings.set("warp_factor", json!(9)),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut settings = MotionSettings::new();
        assert!(settings.set("tracking_sensitivity", json!(300)).is_err());
        assert!(settings.set("gaussian_blur_size", json!(20)).is_err());
        assert!(settings.set("movement_duration", json!(0.0)).is_err());
        assert!(settings.set("pause_duration", json!(-1.0)).is_err());
        assert!(settings.set("min_area", json!("big")).is_err());
        assert_eq!(settings.snapshot(), TuningParameters::default());
    }

    #[test]
    fn file_backed_store_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("motion_config.json");

        let mut settings = MotionSettings::open(&path).unwrap();
        assert!(path.exists());
        settings.apply_preset("outdoor").unwrap();

        let reopened = MotionSettings::open(&path).unwrap();
        assert_eq!(reopened.snapshot().min_area, 2000);

        // An operator edits the file by hand, keeping unrelated legacy keys.
        fs::write(&path, r#"{"min_area": 4321, "debug_mode": true}"#).unwrap();
        settings.reload().unwrap();
        let params = settings.snapshot();
        assert_eq!(params.min_area, 4321);
        assert_eq!(params.movement_threshold, 60);
    }

    #[test]
    fn foreign_keys_in_the_file_survive_a_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("motion_config.json");
        fs::write(
            &path,
            r#"{"min_area": 1800, "debug_mode": true, "motion_timeout": 30.0}"#,
        )
        .unwrap();

        let mut settings = MotionSettings::open(&path).unwrap();
        assert_eq!(settings.get("debug_mode").unwrap(), json!(true));
        settings.apply_preset("aggressive").unwrap();

        let stored: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored["debug_mode"], json!(true));
        assert_eq!(stored["motion_timeout"], json!(30.0));
        assert_eq!(stored["min_area"], json!(1800));
        assert_eq!(stored["tracking_sensitivity"], json!(15));
    }

    #[test]
    fn durations_beyond_the_duration_range_are_rejected() {
        let mut settings = MotionSettings::new();
        for key in ["movement_duration", "pause_duration", "background_reset_time"] {
            assert!(matches!(
                settings.set(key, json!(1e30)),
                Err(ConfigError::InvalidValue { .. })
            ));
        }
        assert_eq!(settings.snapshot(), TuningParameters::default());
    }

    #[test]
    fn duration_getters_saturate_on_unvalidated_values() {
        let params = TuningParameters {
            movement_duration: 1e30,
            pause_duration: f64::NAN,
            background_reset_time: -2.0,
            ..TuningParameters::default()
        };
        assert_eq!(params.movement_duration(), Duration::MAX);
        assert_eq!(params.pause_duration(), Duration::ZERO);
        assert_eq!(params.background_reset_time(), Duration::ZERO);
    }

    #[test]
    fn dilation_passes_are_capped() {
        let mut settings = MotionSettings::new();
        settings.set("dilate_iterations", json!(MAX_DILATE_ITERATIONS)).unwrap();
        assert!(settings.set("dilate_iterations", json!(u32::MAX)).is_err());
        assert_eq!(settings.snapshot().dilate_iterations, MAX_DILATE_ITERATIONS);
    }

    #[test]
    fn invalid_file_on_reload_keeps_current_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("motion_config.json");
        let mut settings = MotionSettings::open(&path).unwrap();

        fs::write(&path, r#"{"background_learning_rate": 7.0}"#).unwrap();
        assert!(settings.reload().is_err());
        assert_eq!(settings.snapshot(), TuningParameters::default());
    }
}
