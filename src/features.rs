// src/features.rs - Posture metrics computed from a single pose frame
use nalgebra::Vector3;

use crate::keypoints::{PoseFrame, LEFT_HIP, LEFT_SHOULDER, NOSE, RIGHT_HIP, RIGHT_SHOULDER};
use crate::profiles::{AngleProfile, MetricKind};

/// Ordered, weighted metric values; length always equals the profile's feature count.
pub type FeatureVector = Vec<f64>;

const SHOULDERS: [usize; 2] = [LEFT_SHOULDER, RIGHT_SHOULDER];
const HEAD_AND_SHOULDERS: [usize; 3] = [NOSE, LEFT_SHOULDER, RIGHT_SHOULDER];
const HIPS: [usize; 2] = [LEFT_HIP, RIGHT_HIP];

/// Raw metric values alongside the weighted vector fed to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureExtraction {
    pub raw: Vec<f64>,
    pub weighted: FeatureVector,
}

impl MetricKind {
    /// Returns 0.0 when any contributing landmark is below this kind's
    /// visibility threshold.
    pub fn compute(&self, frame: &PoseFrame) -> f64 {
        match self {
            MetricKind::ShoulderTilt => shoulder_tilt(frame),
            MetricKind::HeadForwardZ => head_forward_z(frame),
            MetricKind::LateralLean => lateral_lean(frame),
            MetricKind::HeadDrop => head_drop(frame),
            MetricKind::SpineAngle => spine_angle(frame),
            MetricKind::NeckAngle => neck_angle(frame),
        }
    }
}

pub fn extract(profile: &AngleProfile, frame: &PoseFrame) -> FeatureExtraction {
    let raw: Vec<f64> = profile
        .features
        .iter()
        .map(|def| def.kind.compute(frame))
        .collect();

    let weighted = raw
        .iter()
        .zip(profile.features.iter())
        .map(|(value, def)| value * def.weight)
        .collect();

    FeatureExtraction { raw, weighted }
}

/// Degrees between `v` and the upward vertical, from its horizontal-plane
/// magnitude versus its vertical offset. World y points down.
fn angle_from_vertical(v: &Vector3<f64>) -> f64 {
    let horizontal = (v.x * v.x + v.z * v.z).sqrt();
    horizontal.atan2(-v.y).to_degrees()
}

fn shoulder_tilt(frame: &PoseFrame) -> f64 {
    let threshold = MetricKind::ShoulderTilt.min_visibility();
    if frame.min_visibility(&SHOULDERS) < threshold {
        return 0.0;
    }

    let left = frame.landmark(LEFT_SHOULDER);
    let right = frame.landmark(RIGHT_SHOULDER);
    let dy = left.y - right.y;
    let dx = (left.x - right.x).abs();

    if dx < 1e-9 && dy.abs() < 1e-9 {
        return 0.0;
    }

    dy.atan2(dx).to_degrees()
}

fn head_forward_z(frame: &PoseFrame) -> f64 {
    let threshold = MetricKind::HeadForwardZ.min_visibility();
    if frame.min_world_visibility(&HEAD_AND_SHOULDERS) < threshold {
        return 0.0;
    }

    frame.world(NOSE).z - frame.world_shoulder_midpoint().z
}

fn lateral_lean(frame: &PoseFrame) -> f64 {
    let threshold = MetricKind::LateralLean.min_visibility();
    if frame.min_visibility(&HEAD_AND_SHOULDERS) < threshold {
        return 0.0;
    }

    let width = (frame.landmark(LEFT_SHOULDER).x - frame.landmark(RIGHT_SHOULDER).x).abs();
    if width < 1e-6 {
        return 0.0;
    }

    (frame.landmark(NOSE).x - frame.shoulder_midpoint().x) / width
}

fn head_drop(frame: &PoseFrame) -> f64 {
    let threshold = MetricKind::HeadDrop.min_visibility();
    if frame.min_visibility(&HEAD_AND_SHOULDERS) < threshold {
        return 0.0;
    }

    frame.shoulder_midpoint().y - frame.landmark(NOSE).y
}

fn spine_angle(frame: &PoseFrame) -> f64 {
    let threshold = MetricKind::SpineAngle.min_visibility();
    if frame.min_world_visibility(&SHOULDERS) < threshold {
        return 0.0;
    }

    let shoulders = frame.world_shoulder_midpoint();
    if frame.min_world_visibility(&HIPS) >= threshold {
        return angle_from_vertical(&(shoulders - frame.world_hip_midpoint()));
    }

    // Hips out of frame (typical at a desk): head-to-shoulder proxy
    if frame.world(NOSE).visibility < threshold {
        return 0.0;
    }
    angle_from_vertical(&(frame.world(NOSE).position() - shoulders))
}

fn neck_angle(frame: &PoseFrame) -> f64 {
    let threshold = MetricKind::NeckAngle.min_visibility();
    if frame.min_world_visibility(&HEAD_AND_SHOULDERS) < threshold {
        return 0.0;
    }

    angle_from_vertical(&(frame.world(NOSE).position() - frame.world_shoulder_midpoint()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::{Keypoint, WorldKeypoint, POSE_LANDMARK_COUNT};
    use crate::profiles::{CameraAngle, FEATURE_COUNT};

    fn frame_with(edit: impl FnOnce(&mut Vec<Keypoint>, &mut Vec<WorldKeypoint>)) -> PoseFrame {
        let mut image = vec![Keypoint::new(0.5, 0.5, 0.9); POSE_LANDMARK_COUNT];
        let mut world = vec![WorldKeypoint::new(0.0, 0.0, 0.0, 0.9); POSE_LANDMARK_COUNT];

        image[NOSE] = Keypoint::new(0.5, 0.3, 0.95);
        image[LEFT_SHOULDER] = Keypoint::new(0.6, 0.5, 0.95);
        image[RIGHT_SHOULDER] = Keypoint::new(0.4, 0.5, 0.95);
        image[LEFT_HIP] = Keypoint::new(0.55, 0.8, 0.9);
        image[RIGHT_HIP] = Keypoint::new(0.45, 0.8, 0.9);

        world[NOSE] = WorldKeypoint::new(0.0, -0.6, 0.0, 0.95);
        world[LEFT_SHOULDER] = WorldKeypoint::new(0.18, -0.45, 0.0, 0.95);
        world[RIGHT_SHOULDER] = WorldKeypoint::new(-0.18, -0.45, 0.0, 0.95);
        world[LEFT_HIP] = WorldKeypoint::new(0.1, 0.0, 0.0, 0.9);
        world[RIGHT_HIP] = WorldKeypoint::new(-0.1, 0.0, 0.0, 0.9);

        edit(&mut image, &mut world);
        PoseFrame::new(0.0, image, world).unwrap()
    }

    fn upright() -> PoseFrame {
        frame_with(|_, _| {})
    }

    #[test]
    fn upright_pose_is_level_and_vertical() {
        let frame = upright();
        assert!(MetricKind::ShoulderTilt.compute(&frame).abs() < 1e-9);
        assert!(MetricKind::LateralLean.compute(&frame).abs() < 1e-9);
        assert!((MetricKind::HeadDrop.compute(&frame) - 0.2).abs() < 1e-9);
        assert!(MetricKind::NeckAngle.compute(&frame).abs() < 1e-9);
        assert!(MetricKind::SpineAngle.compute(&frame).abs() < 1e-9);
        assert!(MetricKind::HeadForwardZ.compute(&frame).abs() < 1e-9);
    }

    #[test]
    fn forward_head_reads_negative_depth_and_larger_neck_angle() {
        let frame = frame_with(|_, world| {
            world[NOSE] = WorldKeypoint::new(0.0, -0.5, -0.15, 0.95);
        });
        assert!((MetricKind::HeadForwardZ.compute(&frame) + 0.15).abs() < 1e-9);
        let neck = MetricKind::NeckAngle.compute(&frame);
        assert!((neck - 0.15f64.atan2(0.05).to_degrees()).abs() < 1e-9);
    }

    #[test]
    fn tilted_shoulders_give_signed_angle() {
        let frame = frame_with(|image, _| {
            image[LEFT_SHOULDER].y = 0.7;
        });
        let tilt = MetricKind::ShoulderTilt.compute(&frame);
        assert!((tilt - 45.0).abs() < 1e-9);
    }

    #[test]
    fn lateral_lean_is_normalized_by_shoulder_width() {
        let frame = frame_with(|image, _| {
            image[NOSE].x = 0.6;
        });
        assert!((MetricKind::LateralLean.compute(&frame) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn low_visibility_returns_zero() {
        let frame = frame_with(|image, world| {
            image[NOSE].visibility = 0.1;
            world[NOSE].visibility = 0.1;
            world[NOSE].z = -0.3;
        });
        assert_eq!(MetricKind::HeadDrop.compute(&frame), 0.0);
        assert_eq!(MetricKind::HeadForwardZ.compute(&frame), 0.0);
        assert_eq!(MetricKind::NeckAngle.compute(&frame), 0.0);
        // Shoulders are still visible
        assert!(MetricKind::ShoulderTilt.compute(&frame).is_finite());
    }

    #[test]
    fn thresholds_differ_per_kind() {
        // 0.35 passes the 2D threshold (0.3) but fails the 3D one (0.4)
        let frame = frame_with(|image, world| {
            image[NOSE].visibility = 0.35;
            world[NOSE].visibility = 0.35;
            world[NOSE].z = -0.2;
        });
        assert!((MetricKind::HeadDrop.compute(&frame) - 0.2).abs() < 1e-9);
        assert_eq!(MetricKind::HeadForwardZ.compute(&frame), 0.0);
    }

    #[test]
    fn spine_angle_falls_back_to_head_when_hips_hidden() {
        let frame = frame_with(|_, world| {
            world[LEFT_HIP].visibility = 0.1;
            world[RIGHT_HIP].visibility = 0.1;
            world[NOSE] = WorldKeypoint::new(0.0, -0.6, -0.15, 0.95);
        });
        let expected = 0.15f64.atan2(0.15).to_degrees();
        assert!((MetricKind::SpineAngle.compute(&frame) - expected).abs() < 1e-9);
    }

    #[test]
    fn extraction_applies_profile_weights() {
        let frame = frame_with(|image, _| {
            image[LEFT_SHOULDER].y = 0.7;
        });
        let profile = CameraAngle::Front.profile();
        let extraction = extract(profile, &frame);

        assert_eq!(extraction.raw.len(), FEATURE_COUNT);
        assert_eq!(extraction.weighted.len(), FEATURE_COUNT);
        for (i, def) in profile.features.iter().enumerate() {
            assert_eq!(extraction.weighted[i], extraction.raw[i] * def.weight);
        }
    }
}
