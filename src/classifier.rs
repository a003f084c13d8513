// src/classifier.rs - Two-centroid good/bad posture model
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::FeatureVector;
use crate::profiles::CameraAngle;
use crate::training::{PostureLabel, TrainingStore};

/// A model exists only once each class has at least this many samples.
pub const MIN_SAMPLES_PER_CLASS: usize = 3;

/// Combined centroid distance below which the score is ambiguous (0.5).
pub const DEGENERATE_DISTANCE: f64 = 1e-4;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureStatus {
    Good,
    Bad,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// `None` while untrained.
    pub score: Option<f64>,
    pub status: PostureStatus,
}

impl Classification {
    pub const UNKNOWN: Classification = Classification {
        score: None,
        status: PostureStatus::Unknown,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct CentroidModel {
    good: DVector<f64>,
    bad: DVector<f64>,
}

impl CentroidModel {
    /// Builds the model from the samples captured at `angle`. Returns `None`
    /// when either class is short of samples or dimensions disagree.
    pub fn train(store: &TrainingStore, angle: CameraAngle) -> Option<Self> {
        let good: Vec<&FeatureVector> = store
            .for_angle(angle)
            .filter(|s| s.label == PostureLabel::Good)
            .map(|s| &s.features)
            .collect();
        let bad: Vec<&FeatureVector> = store
            .for_angle(angle)
            .filter(|s| s.label == PostureLabel::Bad)
            .map(|s| &s.features)
            .collect();

        if good.len() < MIN_SAMPLES_PER_CLASS || bad.len() < MIN_SAMPLES_PER_CLASS {
            debug!(
                angle = %angle,
                good = good.len(),
                bad = bad.len(),
                "not enough samples to train"
            );
            return None;
        }

        let good = centroid(&good)?;
        let bad = centroid(&bad)?;
        if good.len() != bad.len() {
            return None;
        }

        Some(Self { good, bad })
    }

    pub fn good_centroid(&self) -> &[f64] {
        self.good.as_slice()
    }

    pub fn bad_centroid(&self) -> &[f64] {
        self.bad.as_slice()
    }

    pub fn dimensions(&self) -> usize {
        self.good.len()
    }

    /// 1.0 at the good centroid, 0.0 at the bad centroid, 0.5 when the
    /// centroids (nearly) coincide. `None` if `features` has the wrong length.
    pub fn score(&self, features: &[f64]) -> Option<f64> {
        if features.len() != self.dimensions() {
            return None;
        }

        let v = DVector::from_column_slice(features);
        let dist_good = (&v - &self.good).norm();
        let dist_bad = (&v - &self.bad).norm();
        let total = dist_good + dist_bad;

        if total < DEGENERATE_DISTANCE {
            return Some(0.5);
        }

        Some(dist_bad / total)
    }

    pub fn classify(&self, features: &[f64], threshold: f64) -> Classification {
        match self.score(features) {
            Some(score) => Classification {
                score: Some(score),
                status: if score >= threshold {
                    PostureStatus::Good
                } else {
                    PostureStatus::Bad
                },
            },
            None => Classification::UNKNOWN,
        }
    }
}

/// Per-dimension arithmetic mean.
fn centroid(vectors: &[&FeatureVector]) -> Option<DVector<f64>> {
    let dims = vectors.first()?.len();
    if vectors.iter().any(|v| v.len() != dims) {
        return None;
    }

    let mut sum = DVector::<f64>::zeros(dims);
    for v in vectors {
        sum += DVector::from_column_slice(v);
    }
    Some(sum / vectors.len() as f64)
}
