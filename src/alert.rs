// src/alert.rs - Hysteresis timer over the good/bad posture stream
use std::time::Duration;

use tracing::{debug, info};

use crate::classifier::PostureStatus;

pub const DEFAULT_ALERT_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPhase {
    /// No sustained bad posture.
    Idle,
    /// Bad posture seen, timer running, nothing fired this episode.
    Accruing,
    /// Fired at least once this episode; cooldown governs re-fire.
    Firing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    None,
    Fire,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertTiming {
    pub delay: Duration,
    pub cooldown: Duration,
}

impl Default for AlertTiming {
    fn default() -> Self {
        Self {
            delay: DEFAULT_ALERT_DELAY,
            cooldown: DEFAULT_ALERT_COOLDOWN,
        }
    }
}

/// Timestamps are milliseconds on the upstream capture clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertStateMachine {
    bad_since: Option<f64>,
    last_fired: Option<f64>,
}

impl AlertStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, status: PostureStatus, now: f64, timing: &AlertTiming) -> AlertAction {
        match status {
            PostureStatus::Unknown => AlertAction::None,
            PostureStatus::Good => {
                if self.bad_since.take().is_some() {
                    debug!(now, "bad posture episode ended");
                }
                AlertAction::Clear
            }
            PostureStatus::Bad => {
                let Some(bad_since) = self.bad_since else {
                    self.bad_since = Some(now);
                    debug!(now, "bad posture episode started");
                    return AlertAction::None;
                };

                let delay_ms = timing.delay.as_secs_f64() * 1000.0;
                let cooldown_ms = timing.cooldown.as_secs_f64() * 1000.0;
                let sustained = now - bad_since >= delay_ms;
                let cooled = self
                    .last_fired
                    .map_or(true, |fired| now - fired >= cooldown_ms);

                if sustained && cooled {
                    self.last_fired = Some(now);
                    info!(
                        episode_ms = now - bad_since,
                        "bad posture sustained, firing alert"
                    );
                    AlertAction::Fire
                } else {
                    AlertAction::None
                }
            }
        }
    }

    pub fn phase(&self) -> AlertPhase {
        match (self.bad_since, self.last_fired) {
            (None, _) => AlertPhase::Idle,
            (Some(since), Some(fired)) if fired >= since => AlertPhase::Firing,
            (Some(_), _) => AlertPhase::Accruing,
        }
    }

    pub fn bad_since(&self) -> Option<f64> {
        self.bad_since
    }

    pub fn last_fired(&self) -> Option<f64> {
        self.last_fired
    }
}
