// src/lib.rs
//! Viewpoint-aware posture monitoring: per-frame pose keypoints go in,
//! a good/bad classification and rate-limited alerts come out.

pub mod alert;
pub mod audio;
pub mod classifier;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod features;
pub mod keypoints;
pub mod profiles;
pub mod relay;
pub mod session;
pub mod smoothing;
pub mod training;

pub use alert::{AlertAction, AlertPhase, AlertStateMachine, AlertTiming};
pub use audio::SoundCue;
pub use classifier::{CentroidModel, Classification, PostureStatus};
pub use config::PersistedState;
pub use dispatch::{AlertDispatcher, AlertSink, DispatchSettings, NoRelay, RelayMessage, RelaySink};
pub use error::{MonitorError, Result};
pub use keypoints::{Keypoint, PoseFrame, WorldKeypoint};
pub use profiles::{AngleProfile, CameraAngle};
pub use relay::RelayClient;
pub use session::{FrameOutcome, PostureSession};
pub use training::{PostureLabel, TrainingSample, TrainingStore};
