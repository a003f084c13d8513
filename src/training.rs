// src/training.rs - Labeled posture samples captured by the user
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;
use crate::profiles::CameraAngle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureLabel {
    Good,
    Bad,
}

impl fmt::Display for PostureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostureLabel::Good => f.write_str("good"),
            PostureLabel::Bad => f.write_str("bad"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub label: PostureLabel,
    #[serde(default)]
    pub angle: CameraAngle,
    pub features: FeatureVector,
    /// Capture time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

/// Append-only sample log with undo of the latest entry and bulk clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingStore {
    samples: Vec<TrainingSample>,
}

impl TrainingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: Vec<TrainingSample>) -> Self {
        Self { samples }
    }

    pub fn push(&mut self, sample: TrainingSample) {
        self.samples.push(sample);
    }

    /// Removes the most recently appended sample, whatever its angle.
    pub fn undo(&mut self) -> Option<TrainingSample> {
        self.samples.pop()
    }

    /// Empties the store across every angle; returns how many samples were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.samples.len();
        self.samples.clear();
        removed
    }

    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn for_angle(&self, angle: CameraAngle) -> impl Iterator<Item = &TrainingSample> {
        self.samples.iter().filter(move |s| s.angle == angle)
    }

    /// (good, bad) sample counts for one angle.
    pub fn counts(&self, angle: CameraAngle) -> (usize, usize) {
        self.for_angle(angle).fold((0, 0), |(good, bad), s| match s.label {
            PostureLabel::Good => (good + 1, bad),
            PostureLabel::Bad => (good, bad + 1),
        })
    }
}
