// src/data.rs
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Local;
use csv::Writer;
use serde::Serialize;
use tracing::info;

use crate::alert::AlertAction;
use crate::classifier::PostureStatus;
use crate::error::Result;
use crate::session::FrameOutcome;
use crate::training::{PostureLabel, TrainingSample};

#[derive(Debug, Serialize)]
struct SampleRecord {
    label: PostureLabel,
    angle: &'static str,
    timestamp: i64,
    f0: Option<f64>,
    f1: Option<f64>,
    f2: Option<f64>,
    f3: Option<f64>,
}

#[derive(Debug, Serialize)]
struct FrameRecord {
    timestamp: f64,
    status: PostureStatus,
    score: Option<f64>,
    alert: &'static str,
    raw0: Option<f64>,
    raw1: Option<f64>,
    raw2: Option<f64>,
    raw3: Option<f64>,
}

/// Writes training samples and the per-frame monitoring log as CSV under
/// `<output_dir>/<session_name>/`.
pub struct DataExporter {
    output_dir: PathBuf,
    session_name: String,
    frames: Vec<FrameRecord>,
}

impl DataExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            frames: Vec::new(),
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn add_frame(&mut self, outcome: &FrameOutcome) {
        let raw = |i: usize| outcome.raw.get(i).copied();
        self.frames.push(FrameRecord {
            timestamp: outcome.timestamp,
            status: outcome.classification.status,
            score: outcome.classification.score,
            alert: match outcome.action {
                AlertAction::None => "",
                AlertAction::Fire => "fire",
                AlertAction::Clear => "clear",
            },
            raw0: raw(0),
            raw1: raw(1),
            raw2: raw(2),
            raw3: raw(3),
        });
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn export_samples(&self, samples: &[TrainingSample]) -> Result<PathBuf> {
        let path = self.prepare("training_samples.csv")?;
        let mut writer = Writer::from_writer(File::create(&path)?);

        for sample in samples {
            let f = |i: usize| sample.features.get(i).copied();
            writer.serialize(SampleRecord {
                label: sample.label,
                angle: sample.angle.as_str(),
                timestamp: sample.timestamp,
                f0: f(0),
                f1: f(1),
                f2: f(2),
                f3: f(3),
            })?;
        }

        writer.flush()?;
        info!(path = %path.display(), count = samples.len(), "training samples exported");
        Ok(path)
    }

    pub fn export_frames(&self) -> Result<PathBuf> {
        let path = self.prepare("frames.csv")?;
        let mut writer = Writer::from_writer(File::create(&path)?);

        for record in &self.frames {
            writer.serialize(record)?;
        }

        writer.flush()?;
        info!(path = %path.display(), count = self.frames.len(), "frame log exported");
        Ok(path)
    }

    fn prepare(&self, file_name: &str) -> Result<PathBuf> {
        let dir = self.session_dir();
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join(file_name))
    }
}
