// src/main.rs
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use posture_monitor::classifier::PostureStatus;
use posture_monitor::config::{self, PersistedState};
use posture_monitor::data::DataExporter;
use posture_monitor::dispatch::{AlertDispatcher, AlertSink, NoRelay, Notification, RelaySink};
use posture_monitor::{
    CameraAngle, FrameOutcome, PoseFrame, PostureLabel, PostureSession, RelayClient, SoundCue,
};

const CUE_SAMPLE_RATE: u32 = 44_100;
const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:8765";

#[derive(Parser)]
#[command(name = "posture-monitor", about = "Classify posture from pose keypoints read on stdin")]
struct Cli {
    /// Saved state file (defaults to the per-user config directory)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Address of the out-of-process notifier
    #[arg(long, default_value = DEFAULT_RELAY_ADDR)]
    relay: String,

    #[arg(long, conflicts_with = "relay")]
    no_relay: bool,

    /// Write training samples and a per-frame log as CSV under this directory on exit
    #[arg(long)]
    csv_log: Option<PathBuf>,

    /// Treat in-session notifications as permitted
    #[arg(long)]
    notifications_granted: bool,
}

/// One line of stdin.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum InputEvent {
    Frame(PoseFrame),
    Capture { label: PostureLabel },
    Undo,
    Clear {
        #[serde(default)]
        confirm: bool,
    },
    SetAngle { angle: CameraAngle },
    SetThreshold { value: f64 },
    SetDelay { seconds: f64 },
    SetCooldown { seconds: f64 },
    SetSound { enabled: bool },
    SetNotify { enabled: bool },
    SelectSound { id: SoundCue },
    Export { path: PathBuf },
    Import { path: PathBuf },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusLine<'a> {
    timestamp: f64,
    status: PostureStatus,
    score: Option<f64>,
    features: Vec<&'static str>,
    raw: &'a [f64],
    overlay_hint: PostureStatus,
    critical_keypoints: &'static BTreeSet<usize>,
    alert_visible: bool,
}

/// Renders every alert output as a log line.
struct ConsoleSink {
    notifications_granted: bool,
}

impl AlertSink for ConsoleSink {
    fn set_overlay_visible(&mut self, visible: bool) {
        info!(visible, "alert overlay");
    }

    fn play_cue(&mut self, cue: SoundCue) {
        let samples = cue.synthesize(CUE_SAMPLE_RATE);
        info!(cue = cue.id(), samples = samples.len(), "playing alert cue");
    }

    fn notification_permission_granted(&self) -> bool {
        self.notifications_granted
    }

    fn show_notification(&mut self, notification: &Notification) {
        info!(
            title = %notification.title,
            tag = %notification.tag,
            auto_close_ms = notification.auto_close.as_millis() as u64,
            "{}",
            notification.body
        );
    }

    fn set_title(&mut self, title: &str) {
        debug!(title, "window title");
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

struct Host {
    session: PostureSession,
    dispatcher: AlertDispatcher<ConsoleSink, Box<dyn RelaySink>>,
    state_path: Option<PathBuf>,
    exporter: Option<DataExporter>,
}

impl Host {
    fn persist(&self) {
        let Some(path) = &self.state_path else {
            return;
        };
        if let Err(e) = self.session.snapshot().save(path) {
            warn!(path = %path.display(), error = %e, "failed to save state");
        }
    }

    fn handle(&mut self, event: InputEvent) -> Result<()> {
        match event {
            InputEvent::Frame(frame) => {
                if let Some(outcome) = self.session.process_frame(&frame) {
                    self.on_outcome(&outcome)?;
                }
                return Ok(());
            }
            InputEvent::Capture { label } => {
                if !self.session.capture(label) {
                    return Ok(());
                }
            }
            InputEvent::Undo => {
                if !self.session.undo() {
                    debug!("nothing to undo");
                    return Ok(());
                }
            }
            InputEvent::Clear { confirm } => {
                if !confirm {
                    warn!("clear requires \"confirm\": true, ignored");
                    return Ok(());
                }
                self.session.clear();
            }
            InputEvent::SetAngle { angle } => self.session.set_angle(angle),
            InputEvent::SetThreshold { value } => {
                if !value.is_finite() {
                    warn!(value, "threshold must be a number");
                    return Ok(());
                }
                self.session.set_threshold(value);
            }
            InputEvent::SetDelay { seconds } => {
                let Some(delay) = seconds_to_duration(seconds) else {
                    return Ok(());
                };
                self.session.set_alert_delay(delay);
            }
            InputEvent::SetCooldown { seconds } => {
                let Some(cooldown) = seconds_to_duration(seconds) else {
                    return Ok(());
                };
                self.session.set_alert_cooldown(cooldown);
            }
            InputEvent::SetSound { enabled } => self.session.set_sound(enabled),
            InputEvent::SetNotify { enabled } => self.session.set_notify(enabled),
            InputEvent::SelectSound { id } => self.session.select_cue(id),
            InputEvent::Export { path } => {
                if let Err(e) = export_to(&self.session, &path) {
                    warn!(error = %e, "export failed");
                }
                return Ok(());
            }
            InputEvent::Import { path } => match import_from(&path) {
                Ok(state) => self.session.restore(state),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "import rejected, state unchanged");
                    return Ok(());
                }
            },
        }

        self.persist();
        Ok(())
    }

    fn on_outcome(&mut self, outcome: &FrameOutcome) -> Result<()> {
        let settings = self.session.settings().dispatch;
        self.dispatcher
            .handle(outcome.action, outcome.timestamp, &settings);

        if let Some(exporter) = self.exporter.as_mut() {
            exporter.add_frame(outcome);
        }

        let line = StatusLine {
            timestamp: outcome.timestamp,
            status: outcome.classification.status,
            score: outcome.classification.score,
            features: self.session.profile().feature_names(),
            raw: &outcome.raw,
            overlay_hint: self.session.overlay_hint(),
            critical_keypoints: self.session.critical_keypoints(),
            alert_visible: self.dispatcher.overlay_visible(),
        };
        println!("{}", serde_json::to_string(&line).context("failed to encode status line")?);
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        if let Some(exporter) = &self.exporter {
            exporter
                .export_samples(self.session.store().samples())
                .context("failed to write training sample log")?;
            exporter
                .export_frames()
                .context("failed to write frame log")?;
            info!(frames = exporter.frame_count(), dir = %exporter.session_dir().display(), "csv logs written");
        }
        Ok(())
    }
}

fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) => Some(duration),
        Err(e) => {
            warn!(seconds, error = %e, "invalid duration ignored");
            None
        }
    }
}

fn export_to(session: &PostureSession, path: &Path) -> Result<()> {
    let json = session
        .snapshot()
        .export_json(Utc::now())
        .context("failed to encode export")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), samples = session.store().len(), "configuration exported");
    Ok(())
}

fn import_from(path: &Path) -> Result<PersistedState> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let state = PersistedState::import_json(&text)?;
    info!(path = %path.display(), samples = state.training_samples.len(), "configuration imported");
    Ok(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let state_path = cli.state.or_else(config::default_state_path);
    let state = match &state_path {
        Some(path) => PersistedState::load_or_default(path),
        None => {
            warn!("no config directory available, state will not be saved");
            PersistedState::default()
        }
    };

    let relay: Box<dyn RelaySink> = if cli.no_relay {
        Box::new(NoRelay)
    } else {
        info!(addr = %cli.relay, "relay enabled");
        Box::new(RelayClient::spawn(cli.relay))
    };

    let mut host = Host {
        session: PostureSession::from_state(state),
        dispatcher: AlertDispatcher::new(
            ConsoleSink {
                notifications_granted: cli.notifications_granted,
            },
            relay,
        ),
        state_path,
        exporter: cli.csv_log.map(|dir| DataExporter::new(dir, None)),
    };
    info!(
        angle = %host.session.angle(),
        samples = host.session.store().len(),
        trained = host.session.model().is_some(),
        "posture monitor ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InputEvent>(line) {
            Ok(event) => host.handle(event)?,
            Err(e) => warn!(error = %e, "unrecognized input line skipped"),
        }
    }

    host.finish()?;
    info!("input closed, shutting down");
    Ok(())
}
