// src/session.rs - The monitoring session: one object owning every piece of core state
use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::alert::{
    AlertAction, AlertPhase, AlertStateMachine, AlertTiming, DEFAULT_ALERT_COOLDOWN,
    DEFAULT_ALERT_DELAY,
};
use crate::audio::SoundCue;
use crate::classifier::{CentroidModel, Classification, PostureStatus, DEFAULT_THRESHOLD};
use crate::config::PersistedState;
use crate::dispatch::DispatchSettings;
use crate::features::{self, FeatureVector};
use crate::keypoints::PoseFrame;
use crate::profiles::{AngleProfile, CameraAngle};
use crate::smoothing::FeatureSmoother;
use crate::training::{PostureLabel, TrainingSample, TrainingStore};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    /// Scores at or above this are good posture.
    pub threshold: f64,
    pub timing: AlertTiming,
    pub dispatch: DispatchSettings,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            timing: AlertTiming::default(),
            dispatch: DispatchSettings::default(),
        }
    }
}

/// Result of one classification cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub timestamp: f64,
    /// Unweighted metric values, for display.
    pub raw: Vec<f64>,
    pub smoothed: FeatureVector,
    pub classification: Classification,
    pub action: AlertAction,
}

pub struct PostureSession {
    angle: CameraAngle,
    store: TrainingStore,
    model: Option<CentroidModel>,
    smoother: FeatureSmoother,
    alert: AlertStateMachine,
    settings: MonitorSettings,
    last_timestamp: Option<f64>,
    last_raw: Option<Vec<f64>>,
    classification: Classification,
}

impl PostureSession {
    pub fn new() -> Self {
        Self {
            angle: CameraAngle::default(),
            store: TrainingStore::new(),
            model: None,
            smoother: FeatureSmoother::default(),
            alert: AlertStateMachine::new(),
            settings: MonitorSettings::default(),
            last_timestamp: None,
            last_raw: None,
            classification: Classification::UNKNOWN,
        }
    }

    pub fn from_state(state: PersistedState) -> Self {
        let mut session = Self::new();
        session.restore(state);
        session
    }

    /// Runs extraction, smoothing, scoring and the alert update for one frame.
    /// Returns `None` for a repeated upstream timestamp.
    pub fn process_frame(&mut self, frame: &PoseFrame) -> Option<FrameOutcome> {
        let timestamp = frame.timestamp();
        if self.last_timestamp == Some(timestamp) {
            return None;
        }
        self.last_timestamp = Some(timestamp);

        let extraction = features::extract(self.profile(), frame);

        let smoothed = match self.smoother.update(&extraction.weighted) {
            Ok(smoothed) => smoothed.to_vec(),
            Err(e) => {
                warn!(error = %e, "stale smoothing state, restarting average");
                self.smoother.reset();
                self.smoother.update(&extraction.weighted).ok()?.to_vec()
            }
        };

        self.classification = match &self.model {
            Some(model) => model.classify(&smoothed, self.settings.threshold),
            None => Classification::UNKNOWN,
        };

        let action = self
            .alert
            .update(self.classification.status, timestamp, &self.settings.timing);

        self.last_raw = Some(extraction.raw.clone());

        Some(FrameOutcome {
            timestamp,
            raw: extraction.raw,
            smoothed,
            classification: self.classification,
            action,
        })
    }

    /// Stores the current smoothed vector under `label`. No-op (returns false)
    /// before the first frame.
    pub fn capture(&mut self, label: PostureLabel) -> bool {
        self.capture_at(label, Utc::now().timestamp_millis())
    }

    pub fn capture_at(&mut self, label: PostureLabel, timestamp: i64) -> bool {
        let Some(features) = self.smoother.current() else {
            debug!(%label, "capture ignored, no features yet");
            return false;
        };

        self.store.push(TrainingSample {
            label,
            angle: self.angle,
            features: features.to_vec(),
            timestamp,
        });
        let (good, bad) = self.store.counts(self.angle);
        info!(%label, angle = %self.angle, good, bad, "training sample captured");

        self.retrain();
        true
    }

    /// Removes the most recent sample of any angle.
    pub fn undo(&mut self) -> bool {
        match self.store.undo() {
            Some(sample) => {
                info!(label = %sample.label, angle = %sample.angle, "training sample removed");
                self.retrain();
                true
            }
            None => false,
        }
    }

    /// Drops every sample for every angle. Callers confirm with the user first.
    pub fn clear(&mut self) -> usize {
        let removed = self.store.clear();
        if removed > 0 {
            info!(removed, "training data cleared");
        }
        self.retrain();
        removed
    }

    pub fn set_angle(&mut self, angle: CameraAngle) {
        if angle == self.angle {
            return;
        }
        info!(from = %self.angle, to = %angle, "camera angle changed");
        self.angle = angle;
        self.smoother.reset();
        self.last_raw = None;
        self.retrain();
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.settings.threshold = threshold.clamp(0.0, 1.0);
    }

    pub fn set_alert_delay(&mut self, delay: Duration) {
        self.settings.timing.delay = delay;
    }

    pub fn set_alert_cooldown(&mut self, cooldown: Duration) {
        self.settings.timing.cooldown = cooldown;
    }

    pub fn set_sound(&mut self, enabled: bool) {
        self.settings.dispatch.sound = enabled;
    }

    pub fn set_notify(&mut self, enabled: bool) {
        self.settings.dispatch.notify = enabled;
    }

    pub fn select_cue(&mut self, cue: SoundCue) {
        self.settings.dispatch.cue = cue;
    }

    /// Replaces training data, angle and settings in one step.
    pub fn restore(&mut self, state: PersistedState) {
        if state.camera_angle != self.angle {
            self.smoother.reset();
            self.last_raw = None;
        }
        self.angle = state.camera_angle;
        self.store = TrainingStore::from_samples(state.training_samples);
        self.settings = MonitorSettings {
            threshold: state.thresh_score.clamp(0.0, 1.0),
            timing: AlertTiming {
                delay: seconds_or(state.alert_delay, DEFAULT_ALERT_DELAY),
                cooldown: seconds_or(state.alert_cooldown, DEFAULT_ALERT_COOLDOWN),
            },
            dispatch: DispatchSettings {
                sound: state.sound,
                notify: state.notify,
                cue: state.selected_sound,
            },
        };
        self.retrain();
    }

    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            camera_angle: self.angle,
            training_samples: self.store.samples().to_vec(),
            selected_sound: self.settings.dispatch.cue,
            thresh_score: self.settings.threshold,
            alert_delay: self.settings.timing.delay.as_secs_f64(),
            alert_cooldown: self.settings.timing.cooldown.as_secs_f64(),
            sound: self.settings.dispatch.sound,
            notify: self.settings.dispatch.notify,
        }
    }

    fn retrain(&mut self) {
        self.model = CentroidModel::train(&self.store, self.angle);
        if self.model.is_none() {
            self.classification = Classification::UNKNOWN;
        }
        debug!(angle = %self.angle, trained = self.model.is_some(), "model retrained");
    }

    pub fn angle(&self) -> CameraAngle {
        self.angle
    }

    pub fn profile(&self) -> &'static AngleProfile {
        self.angle.profile()
    }

    pub fn critical_keypoints(&self) -> &'static BTreeSet<usize> {
        &self.profile().critical_keypoints
    }

    pub fn store(&self) -> &TrainingStore {
        &self.store
    }

    pub fn model(&self) -> Option<&CentroidModel> {
        self.model.as_ref()
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn smoothed(&self) -> Option<&[f64]> {
        self.smoother.current()
    }

    pub fn last_raw(&self) -> Option<&[f64]> {
        self.last_raw.as_deref()
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Tri-state color hint for the skeleton renderer.
    pub fn overlay_hint(&self) -> PostureStatus {
        self.classification.status
    }

    pub fn alert_phase(&self) -> AlertPhase {
        self.alert.phase()
    }
}

/// Out-of-range seconds (negative, non-finite, overflowing) fall back to `default`.
fn seconds_or(secs: f64, default: Duration) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or_else(|e| {
        warn!(secs, error = %e, "unusable alert duration, using default");
        default
    })
}

impl Default for PostureSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::{
        Keypoint, WorldKeypoint, LEFT_SHOULDER, NOSE, POSE_LANDMARK_COUNT, RIGHT_SHOULDER,
    };

    /// Only the nose height varies, which moves the front profile's head drop.
    fn frame(timestamp: f64, nose_y: f64) -> PoseFrame {
        let mut image = vec![Keypoint::new(0.5, 0.5, 0.9); POSE_LANDMARK_COUNT];
        let mut world = vec![WorldKeypoint::new(0.0, 0.0, 0.0, 0.9); POSE_LANDMARK_COUNT];
        image[NOSE] = Keypoint::new(0.5, nose_y, 0.9);
        image[LEFT_SHOULDER] = Keypoint::new(0.6, 0.5, 0.9);
        image[RIGHT_SHOULDER] = Keypoint::new(0.4, 0.5, 0.9);
        world[NOSE] = WorldKeypoint::new(0.0, -0.6, 0.0, 0.9);
        world[LEFT_SHOULDER] = WorldKeypoint::new(0.18, -0.45, 0.0, 0.9);
        world[RIGHT_SHOULDER] = WorldKeypoint::new(-0.18, -0.45, 0.0, 0.9);
        PoseFrame::new(timestamp, image, world).unwrap()
    }

    fn train_front(session: &mut PostureSession) {
        let mut t = 0.0;
        for (label, nose_y) in [(PostureLabel::Good, 0.2), (PostureLabel::Bad, 0.45)] {
            session.smoother.reset();
            for _ in 0..3 {
                t += 33.0;
                session.process_frame(&frame(t, nose_y));
                assert!(session.capture_at(label, t as i64));
            }
        }
    }

    #[test]
    fn duplicate_timestamps_are_skipped() {
        let mut session = PostureSession::new();
        assert!(session.process_frame(&frame(100.0, 0.2)).is_some());
        assert!(session.process_frame(&frame(100.0, 0.2)).is_none());
        assert!(session.process_frame(&frame(133.0, 0.2)).is_some());
    }

    #[test]
    fn untrained_session_reports_unknown_and_never_alerts() {
        let mut session = PostureSession::new();
        for i in 0..400 {
            let outcome = session.process_frame(&frame(i as f64 * 100.0, 0.45)).unwrap();
            assert_eq!(outcome.classification, Classification::UNKNOWN);
            assert_eq!(outcome.action, AlertAction::None);
        }
    }

    #[test]
    fn capture_before_first_frame_is_a_noop() {
        let mut session = PostureSession::new();
        assert!(!session.capture(PostureLabel::Good));
        assert!(session.store().is_empty());
    }

    #[test]
    fn trained_session_classifies_both_postures() {
        let mut session = PostureSession::new();
        train_front(&mut session);
        assert!(session.model().is_some());

        session.smoother.reset();
        let good = session.process_frame(&frame(10_000.0, 0.2)).unwrap();
        assert_eq!(good.classification.status, PostureStatus::Good);

        session.smoother.reset();
        let bad = session.process_frame(&frame(10_033.0, 0.45)).unwrap();
        assert_eq!(bad.classification.status, PostureStatus::Bad);
        assert_eq!(session.overlay_hint(), PostureStatus::Bad);
    }

    #[test]
    fn capture_then_undo_restores_model() {
        let mut session = PostureSession::new();
        train_front(&mut session);
        let before = session.model().cloned();
        let samples_before = session.store().samples().to_vec();

        session.process_frame(&frame(20_000.0, 0.3));
        assert!(session.capture(PostureLabel::Good));
        assert_ne!(session.model().cloned(), before);

        assert!(session.undo());
        assert_eq!(session.model().cloned(), before);
        assert_eq!(session.store().samples(), samples_before.as_slice());
    }

    #[test]
    fn switching_angle_resets_smoothing_and_filters_samples() {
        let mut session = PostureSession::new();
        train_front(&mut session);
        assert!(session.smoothed().is_some());

        session.set_angle(CameraAngle::SideLeft);
        assert!(session.smoothed().is_none());
        assert!(session.model().is_none());
        assert_eq!(session.store().len(), 6);

        session.set_angle(CameraAngle::Front);
        assert!(session.model().is_some());
    }

    #[test]
    fn clear_drops_every_angle_and_model() {
        let mut session = PostureSession::new();
        train_front(&mut session);
        assert_eq!(session.clear(), 6);
        assert!(session.model().is_none());
        assert_eq!(session.classification(), Classification::UNKNOWN);
        assert_eq!(session.clear(), 0);
        assert!(!session.undo());
    }

    #[test]
    fn sustained_bad_posture_fires_once_per_cooldown() {
        let mut session = PostureSession::new();
        train_front(&mut session);
        session.smoother.reset();

        let mut fires = Vec::new();
        for i in 0..=400 {
            let t = 100_000.0 + i as f64 * 100.0;
            let outcome = session.process_frame(&frame(t, 0.45)).unwrap();
            if outcome.action == AlertAction::Fire {
                fires.push(t - 100_000.0);
            }
        }
        assert_eq!(fires, vec![5_000.0, 35_000.0]);
        assert_eq!(session.alert_phase(), AlertPhase::Firing);
    }

    #[test]
    fn restoring_unvalidated_durations_does_not_panic() {
        let state = PersistedState {
            alert_delay: 1e30,
            alert_cooldown: f64::NAN,
            ..PersistedState::default()
        };
        let session = PostureSession::from_state(state);
        assert_eq!(session.settings().timing, AlertTiming::default());
    }

    #[test]
    fn threshold_is_clamped() {
        let mut session = PostureSession::new();
        session.set_threshold(3.0);
        assert_eq!(session.settings().threshold, 1.0);
        session.set_threshold(-1.0);
        assert_eq!(session.settings().threshold, 0.0);
    }
}
