// src/audio.rs - Catalog of short synthesized alert cues
use std::f64::consts::TAU;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SoundCue {
    #[default]
    Chime,
    Ding,
    Pop,
    Bell,
    Soft,
}

#[derive(Debug, Clone, Copy)]
struct Tone {
    freq: f64,
    start: f64,
    duration: f64,
    gain: f64,
}

const fn tone(freq: f64, start: f64, duration: f64, gain: f64) -> Tone {
    Tone { freq, start, duration, gain }
}

const CHIME: &[Tone] = &[tone(880.0, 0.0, 0.25, 0.5), tone(1318.5, 0.12, 0.35, 0.4)];
const DING: &[Tone] = &[tone(1046.5, 0.0, 0.4, 0.6), tone(2093.0, 0.0, 0.2, 0.15)];
const POP: &[Tone] = &[tone(600.0, 0.0, 0.06, 0.7)];
const BELL: &[Tone] = &[
    tone(523.25, 0.0, 0.8, 0.45),
    tone(1046.5, 0.0, 0.5, 0.2),
    tone(1568.0, 0.0, 0.3, 0.1),
];
const SOFT: &[Tone] = &[tone(440.0, 0.0, 0.3, 0.25), tone(554.4, 0.2, 0.3, 0.2)];

const ATTACK_SECS: f64 = 0.01;

impl SoundCue {
    pub const ALL: [SoundCue; 5] = [
        SoundCue::Chime,
        SoundCue::Ding,
        SoundCue::Pop,
        SoundCue::Bell,
        SoundCue::Soft,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SoundCue::Chime => "chime",
            SoundCue::Ding => "ding",
            SoundCue::Pop => "pop",
            SoundCue::Bell => "bell",
            SoundCue::Soft => "soft",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.id() == id)
    }

    fn tones(&self) -> &'static [Tone] {
        match self {
            SoundCue::Chime => CHIME,
            SoundCue::Ding => DING,
            SoundCue::Pop => POP,
            SoundCue::Bell => BELL,
            SoundCue::Soft => SOFT,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.tones()
            .iter()
            .map(|t| t.start + t.duration)
            .fold(0.0, f64::max)
    }

    /// Mono PCM in [-1, 1] at `sample_rate`.
    pub fn synthesize(&self, sample_rate: u32) -> Vec<f32> {
        let rate = f64::from(sample_rate);
        let len = (self.duration_secs() * rate).ceil() as usize;
        let mut samples = vec![0.0f64; len];

        for t in self.tones() {
            let first = (t.start * rate) as usize;
            let count = (t.duration * rate) as usize;
            for i in 0..count {
                let Some(slot) = samples.get_mut(first + i) else {
                    break;
                };
                let secs = i as f64 / rate;
                let envelope = if secs < ATTACK_SECS {
                    secs / ATTACK_SECS
                } else {
                    (-(secs - ATTACK_SECS) * 5.0 / t.duration).exp()
                };
                *slot += t.gain * envelope * (TAU * t.freq * secs).sin();
            }
        }

        samples.into_iter().map(|s| s.clamp(-1.0, 1.0) as f32).collect()
    }
}

impl From<String> for SoundCue {
    /// Unknown ids fall back to the baseline cue.
    fn from(id: String) -> Self {
        Self::from_id(&id).unwrap_or_default()
    }
}

impl From<SoundCue> for String {
    fn from(cue: SoundCue) -> Self {
        cue.id().to_string()
    }
}

impl fmt::Display for SoundCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
