// src/config.rs - Persisted session state, export/import envelope and schema migration
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alert::{DEFAULT_ALERT_COOLDOWN, DEFAULT_ALERT_DELAY};
use crate::audio::SoundCue;
use crate::classifier::DEFAULT_THRESHOLD;
use crate::error::{MonitorError, Result};
use crate::profiles::{CameraAngle, FEATURE_COUNT};
use crate::training::TrainingSample;

pub const SCHEMA_VERSION: u32 = 2;
pub const EXPORT_TYPE_TAG: &str = "posture-monitor-config";
const STATE_FILE_NAME: &str = "state.json";

/// Everything that survives a restart. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub camera_angle: CameraAngle,
    pub training_samples: Vec<TrainingSample>,
    pub selected_sound: SoundCue,
    pub thresh_score: f64,
    pub alert_delay: f64,
    pub alert_cooldown: f64,
    pub sound: bool,
    pub notify: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            camera_angle: CameraAngle::default(),
            training_samples: Vec::new(),
            selected_sound: SoundCue::default(),
            thresh_score: DEFAULT_THRESHOLD,
            alert_delay: DEFAULT_ALERT_DELAY.as_secs_f64(),
            alert_cooldown: DEFAULT_ALERT_COOLDOWN.as_secs_f64(),
            sound: true,
            notify: true,
        }
    }
}

#[derive(Serialize)]
struct StoredState<'a> {
    #[serde(rename = "_version")]
    version: u32,
    #[serde(flatten)]
    state: &'a PersistedState,
}

#[derive(Serialize)]
struct ExportEnvelope<'a> {
    #[serde(rename = "_type")]
    kind: &'static str,
    #[serde(rename = "_version")]
    version: u32,
    #[serde(rename = "_exported")]
    exported: DateTime<Utc>,
    #[serde(flatten)]
    state: &'a PersistedState,
}

impl PersistedState {
    pub fn validate(&self) -> Result<()> {
        if !self.thresh_score.is_finite() || !(0.0..=1.0).contains(&self.thresh_score) {
            return Err(MonitorError::InvalidConfig(format!(
                "threshScore {} outside [0, 1]",
                self.thresh_score
            )));
        }
        for (name, secs) in [("alertDelay", self.alert_delay), ("alertCooldown", self.alert_cooldown)] {
            if Duration::try_from_secs_f64(secs).is_err() {
                return Err(MonitorError::InvalidConfig(format!(
                    "{name} must be a non-negative number of seconds, got {secs}"
                )));
            }
        }
        for (i, sample) in self.training_samples.iter().enumerate() {
            if sample.features.len() != FEATURE_COUNT {
                return Err(MonitorError::InvalidConfig(format!(
                    "training sample {i} has {} features, expected {FEATURE_COUNT}",
                    sample.features.len()
                )));
            }
            if sample.features.iter().any(|f| !f.is_finite()) {
                return Err(MonitorError::InvalidConfig(format!(
                    "training sample {i} has non-finite features"
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&StoredState {
            version: SCHEMA_VERSION,
            state: self,
        })?)
    }

    /// Parses a stored (untagged) payload, migrating older schema versions.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        parse_versioned(value)
    }

    pub fn export_json(&self, exported: DateTime<Utc>) -> Result<String> {
        Ok(serde_json::to_string_pretty(&ExportEnvelope {
            kind: EXPORT_TYPE_TAG,
            version: SCHEMA_VERSION,
            exported,
            state: self,
        })?)
    }

    /// Accepts only payloads carrying the export type tag. Nothing is
    /// returned unless the whole payload is valid.
    pub fn import_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let tag = value.get("_type").and_then(Value::as_str);
        if tag != Some(EXPORT_TYPE_TAG) {
            return Err(MonitorError::WrongExportTag {
                found: tag.map(str::to_string),
            });
        }
        parse_versioned(value)
    }

    /// Any failure falls back to defaults; a broken file never stops startup.
    pub fn load_or_default(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no saved state, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read saved state, using defaults");
                return Self::default();
            }
        };

        match Self::from_json(&text) {
            Ok(state) => {
                info!(
                    path = %path.display(),
                    samples = state.training_samples.len(),
                    "loaded saved state"
                );
                state
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "saved state is corrupt, using defaults");
                Self::default()
            }
        }
    }

    /// Writes through a temp file and rename so a crash never leaves a torn file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, self.to_json()?)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "state saved");
        Ok(())
    }
}

pub fn default_state_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "posture-monitor").map(|dirs| dirs.config_dir().join(STATE_FILE_NAME))
}

fn parse_versioned(mut value: Value) -> Result<PersistedState> {
    if !value.is_object() {
        return Err(MonitorError::InvalidConfig("expected a JSON object".into()));
    }

    let version = match value.get("_version") {
        None => 1,
        Some(raw) => {
            let found = raw.as_u64().ok_or_else(|| {
                MonitorError::InvalidConfig(format!("_version must be an unsigned integer, got {raw}"))
            })?;
            match u32::try_from(found) {
                Ok(v) if v <= SCHEMA_VERSION => v,
                _ => {
                    return Err(MonitorError::UnsupportedVersion {
                        found,
                        supported: SCHEMA_VERSION,
                    })
                }
            }
        }
    };
    if version < SCHEMA_VERSION {
        migrate(&mut value, version);
    }

    let state: PersistedState = serde_json::from_value(value)?;
    state.validate()?;
    Ok(state)
}

/// Default-fills fields that older schema versions did not carry.
fn migrate(value: &mut Value, from_version: u32) {
    if from_version < 2 {
        debug!(from_version, "migrating saved state to version 2");
        let Some(obj) = value.as_object_mut() else {
            return;
        };
        obj.entry("selectedSound")
            .or_insert_with(|| Value::String(SoundCue::default().id().to_string()));

        if let Some(Value::Array(samples)) = obj.get_mut("trainingSamples") {
            for sample in samples.iter_mut().filter_map(Value::as_object_mut) {
                sample
                    .entry("angle")
                    .or_insert_with(|| Value::String(CameraAngle::Front.as_str().to_string()));
            }
        }
    }
}
