// src/profiles.rs - Camera viewpoint profiles and their feature definitions
use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::keypoints::{
    LEFT_EAR, LEFT_EYE, LEFT_HIP, LEFT_SHOULDER, NOSE, RIGHT_EAR, RIGHT_EYE, RIGHT_HIP,
    RIGHT_SHOULDER,
};

/// Every profile contributes exactly this many features.
pub const FEATURE_COUNT: usize = 4;

/// Where the camera sits relative to the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraAngle {
    #[default]
    Front,
    FrontLeft,
    FrontRight,
    SideLeft,
    SideRight,
}

impl CameraAngle {
    pub const ALL: [CameraAngle; 5] = [
        CameraAngle::Front,
        CameraAngle::FrontLeft,
        CameraAngle::FrontRight,
        CameraAngle::SideLeft,
        CameraAngle::SideRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraAngle::Front => "front",
            CameraAngle::FrontLeft => "front-left",
            CameraAngle::FrontRight => "front-right",
            CameraAngle::SideLeft => "side-left",
            CameraAngle::SideRight => "side-right",
        }
    }

    pub fn from_str_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.as_str() == id)
    }

    pub fn profile(&self) -> &'static AngleProfile {
        profile(*self)
    }
}

impl fmt::Display for CameraAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar posture metrics. Each variant is bound to one pure computation
/// in `features`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    ShoulderTilt,
    HeadForwardZ,
    LateralLean,
    HeadDrop,
    SpineAngle,
    NeckAngle,
}

impl MetricKind {
    /// Minimum visibility every contributing landmark must have.
    pub fn min_visibility(&self) -> f64 {
        match self {
            MetricKind::ShoulderTilt | MetricKind::LateralLean | MetricKind::HeadDrop => 0.3,
            MetricKind::HeadForwardZ | MetricKind::SpineAngle | MetricKind::NeckAngle => 0.4,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::ShoulderTilt | MetricKind::SpineAngle | MetricKind::NeckAngle => "deg",
            MetricKind::HeadForwardZ => "m",
            MetricKind::LateralLean => "ratio",
            MetricKind::HeadDrop => "norm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDefinition {
    pub name: &'static str,
    pub kind: MetricKind,
    pub weight: f64,
}

impl FeatureDefinition {
    const fn new(name: &'static str, kind: MetricKind, weight: f64) -> Self {
        Self { name, kind, weight }
    }
}

#[derive(Debug, Clone)]
pub struct AngleProfile {
    pub id: CameraAngle,
    pub label: &'static str,
    pub features: [FeatureDefinition; FEATURE_COUNT],
    /// Landmarks highlighted by the skeleton renderer for this viewpoint.
    pub critical_keypoints: BTreeSet<usize>,
}

impl AngleProfile {
    pub fn feature_names(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.name).collect()
    }
}

// Weights bring degrees, meters and normalized offsets onto comparable scales.
static PROFILES: Lazy<[AngleProfile; 5]> = Lazy::new(|| {
    use MetricKind::*;

    [
        AngleProfile {
            id: CameraAngle::Front,
            label: "Front",
            features: [
                FeatureDefinition::new("Shoulder tilt", ShoulderTilt, 0.1),
                FeatureDefinition::new("Lateral lean", LateralLean, 2.0),
                FeatureDefinition::new("Head drop", HeadDrop, 5.0),
                FeatureDefinition::new("Neck angle", NeckAngle, 0.05),
            ],
            critical_keypoints: [NOSE, LEFT_EYE, RIGHT_EYE, LEFT_EAR, RIGHT_EAR, LEFT_SHOULDER, RIGHT_SHOULDER]
                .into_iter()
                .collect(),
        },
        AngleProfile {
            id: CameraAngle::FrontLeft,
            label: "Front-left (45°)",
            features: [
                FeatureDefinition::new("Head forward", HeadForwardZ, 10.0),
                FeatureDefinition::new("Neck angle", NeckAngle, 0.05),
                FeatureDefinition::new("Head drop", HeadDrop, 5.0),
                FeatureDefinition::new("Shoulder tilt", ShoulderTilt, 0.1),
            ],
            critical_keypoints: [NOSE, LEFT_EAR, LEFT_SHOULDER, RIGHT_SHOULDER, LEFT_HIP]
                .into_iter()
                .collect(),
        },
        AngleProfile {
            id: CameraAngle::FrontRight,
            label: "Front-right (45°)",
            features: [
                FeatureDefinition::new("Head forward", HeadForwardZ, 10.0),
                FeatureDefinition::new("Neck angle", NeckAngle, 0.05),
                FeatureDefinition::new("Head drop", HeadDrop, 5.0),
                FeatureDefinition::new("Shoulder tilt", ShoulderTilt, 0.1),
            ],
            critical_keypoints: [NOSE, RIGHT_EAR, LEFT_SHOULDER, RIGHT_SHOULDER, RIGHT_HIP]
                .into_iter()
                .collect(),
        },
        AngleProfile {
            id: CameraAngle::SideLeft,
            label: "Left side",
            features: [
                FeatureDefinition::new("Head forward", HeadForwardZ, 10.0),
                FeatureDefinition::new("Spine angle", SpineAngle, 0.05),
                FeatureDefinition::new("Neck angle", NeckAngle, 0.05),
                FeatureDefinition::new("Head drop", HeadDrop, 5.0),
            ],
            critical_keypoints: [NOSE, LEFT_EAR, LEFT_SHOULDER, LEFT_HIP].into_iter().collect(),
        },
        AngleProfile {
            id: CameraAngle::SideRight,
            label: "Right side",
            features: [
                FeatureDefinition::new("Head forward", HeadForwardZ, 10.0),
                FeatureDefinition::new("Spine angle", SpineAngle, 0.05),
                FeatureDefinition::new("Neck angle", NeckAngle, 0.05),
                FeatureDefinition::new("Head drop", HeadDrop, 5.0),
            ],
            critical_keypoints: [NOSE, RIGHT_EAR, RIGHT_SHOULDER, RIGHT_HIP].into_iter().collect(),
        },
    ]
});

pub fn profile(angle: CameraAngle) -> &'static AngleProfile {
    PROFILES
        .iter()
        .find(|p| p.id == angle)
        .unwrap_or(&PROFILES[0])
}

pub fn all_profiles() -> &'static [AngleProfile] {
    PROFILES.as_slice()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_angle_has_its_own_profile() {
        for angle in CameraAngle::ALL {
            assert_eq!(profile(angle).id, angle);
            assert_eq!(profile(angle).features.len(), FEATURE_COUNT);
            assert!(!profile(angle).critical_keypoints.is_empty());
        }
        assert_eq!(all_profiles().len(), 5);
    }

    #[test]
    fn angle_ids_round_trip_through_serde() {
        for angle in CameraAngle::ALL {
            let json = serde_json::to_string(&angle).unwrap();
            assert_eq!(json, format!("\"{}\"", angle.as_str()));
            assert_eq!(CameraAngle::from_str_id(angle.as_str()), Some(angle));
        }
        assert_eq!(CameraAngle::from_str_id("overhead"), None);
    }

    #[test]
    fn side_profiles_use_depth_features() {
        let side = CameraAngle::SideLeft.profile();
        assert!(side.features.iter().any(|f| f.kind == MetricKind::HeadForwardZ));
        assert!(side.features.iter().any(|f| f.kind == MetricKind::SpineAngle));
    }
}
