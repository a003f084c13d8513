// src/keypoints.rs - Per-frame pose landmarks as delivered by the upstream estimator
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Number of landmarks in a full-body pose frame.
pub const POSE_LANDMARK_COUNT: usize = 33;

// Anatomical landmark indices (BlazePose numbering)
pub const NOSE: usize = 0;
pub const LEFT_EYE: usize = 2;
pub const RIGHT_EYE: usize = 5;
pub const LEFT_EAR: usize = 7;
pub const RIGHT_EAR: usize = 8;
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;

/// Normalized image-space landmark (x, y in [0, 1], y pointing down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub visibility: f64,
}

/// Metric world-space landmark, hip-centred, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldKeypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub visibility: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl WorldKeypoint {
    pub fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self { x, y, z, visibility }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Deserialize)]
struct RawPoseFrame {
    timestamp: f64,
    landmarks: Vec<Keypoint>,
    world_landmarks: Vec<WorldKeypoint>,
}

/// One successful detection: both landmark sets plus the capture timestamp (ms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoseFrame")]
pub struct PoseFrame {
    timestamp: f64,
    landmarks: Vec<Keypoint>,
    world_landmarks: Vec<WorldKeypoint>,
}

impl PoseFrame {
    pub fn new(
        timestamp: f64,
        landmarks: Vec<Keypoint>,
        world_landmarks: Vec<WorldKeypoint>,
    ) -> Result<Self> {
        if landmarks.len() != POSE_LANDMARK_COUNT {
            return Err(MonitorError::DimensionMismatch {
                expected: POSE_LANDMARK_COUNT,
                found: landmarks.len(),
            });
        }
        if world_landmarks.len() != POSE_LANDMARK_COUNT {
            return Err(MonitorError::DimensionMismatch {
                expected: POSE_LANDMARK_COUNT,
                found: world_landmarks.len(),
            });
        }

        Ok(Self {
            timestamp,
            landmarks,
            world_landmarks,
        })
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn landmark(&self, index: usize) -> &Keypoint {
        &self.landmarks[index]
    }

    pub fn world(&self, index: usize) -> &WorldKeypoint {
        &self.world_landmarks[index]
    }

    /// Lowest 2D visibility among the given landmarks.
    pub fn min_visibility(&self, indices: &[usize]) -> f64 {
        indices
            .iter()
            .map(|&i| self.landmarks[i].visibility)
            .fold(f64::INFINITY, f64::min)
    }

    /// Lowest 3D visibility among the given landmarks.
    pub fn min_world_visibility(&self, indices: &[usize]) -> f64 {
        indices
            .iter()
            .map(|&i| self.world_landmarks[i].visibility)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn shoulder_midpoint(&self) -> Vector2<f64> {
        (self.landmark(LEFT_SHOULDER).position() + self.landmark(RIGHT_SHOULDER).position()) / 2.0
    }

    pub fn world_shoulder_midpoint(&self) -> Vector3<f64> {
        (self.world(LEFT_SHOULDER).position() + self.world(RIGHT_SHOULDER).position()) / 2.0
    }

    pub fn world_hip_midpoint(&self) -> Vector3<f64> {
        (self.world(LEFT_HIP).position() + self.world(RIGHT_HIP).position()) / 2.0
    }
}

impl TryFrom<RawPoseFrame> for PoseFrame {
    type Error = MonitorError;

    fn try_from(raw: RawPoseFrame) -> Result<Self> {
        Self::new(raw.timestamp, raw.landmarks, raw.world_landmarks)
    }
}
