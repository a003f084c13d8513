// src/dispatch.rs - Fan-out of alert fire/clear events to the output channels
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::alert::AlertAction;
use crate::audio::SoundCue;

pub const OVERLAY_AUTO_HIDE: Duration = Duration::from_secs(5);
pub const TITLE_FLASH_INTERVAL: Duration = Duration::from_millis(800);
pub const NOTIFICATION_AUTO_CLOSE: Duration = Duration::from_secs(4);

pub const DEFAULT_TITLE: &str = "Posture Monitor";
pub const ALERT_TITLE: &str = "⚠ Sit up straight!";
pub const NOTIFICATION_TAG: &str = "posture-alert";
pub const ALERT_MESSAGE: &str = "You have been slouching for a while. Straighten up!";

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// At most one live notification per tag.
    pub tag: String,
    pub auto_close: Duration,
}

impl Notification {
    fn posture_alert() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: ALERT_MESSAGE.to_string(),
            tag: NOTIFICATION_TAG.to_string(),
            auto_close: NOTIFICATION_AUTO_CLOSE,
        }
    }
}

/// Payload sent to the out-of-process notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl RelayMessage {
    pub fn bad_posture(message: impl Into<String>) -> Self {
        Self {
            kind: "bad-posture".to_string(),
            message: message.into(),
        }
    }
}

/// In-process outputs: overlay, audio, native notification, window title.
pub trait AlertSink {
    fn set_overlay_visible(&mut self, visible: bool);
    fn play_cue(&mut self, cue: SoundCue);
    fn notification_permission_granted(&self) -> bool;
    fn show_notification(&mut self, notification: &Notification);
    fn set_title(&mut self, title: &str);
}

/// Best-effort, fire-and-forget delivery to the external notifier.
pub trait RelaySink {
    fn send(&self, message: &RelayMessage);
}

impl<T: RelaySink + ?Sized> RelaySink for Box<T> {
    fn send(&self, message: &RelayMessage) {
        (**self).send(message)
    }
}

/// Relay stand-in when no notifier is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelay;

impl RelaySink for NoRelay {
    fn send(&self, message: &RelayMessage) {
        debug!(?message, "relay disabled, dropping message");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationChannel {
    Disabled,
    InSession,
    Relay,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchSettings {
    pub sound: bool,
    pub notify: bool,
    pub cue: SoundCue,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            sound: true,
            notify: true,
            cue: SoundCue::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TitleFlash {
    last_toggle: f64,
    showing_alert: bool,
}

/// Timestamps are milliseconds on the same clock as the frame stream;
/// `tick` drives the overlay auto-hide and the title flash.
pub struct AlertDispatcher<S, R> {
    sink: S,
    relay: R,
    overlay_shown_at: Option<f64>,
    flash: Option<TitleFlash>,
}

impl<S: AlertSink, R: RelaySink> AlertDispatcher<S, R> {
    pub fn new(sink: S, relay: R) -> Self {
        Self {
            sink,
            relay,
            overlay_shown_at: None,
            flash: None,
        }
    }

    pub fn handle(&mut self, action: AlertAction, now: f64, settings: &DispatchSettings) {
        match action {
            AlertAction::Fire => {
                self.fire(now, settings);
            }
            AlertAction::Clear => self.clear(),
            AlertAction::None => {}
        }
        self.tick(now);
    }

    pub fn fire(&mut self, now: f64, settings: &DispatchSettings) -> NotificationChannel {
        self.sink.set_overlay_visible(true);
        self.overlay_shown_at = Some(now);

        if settings.sound {
            self.sink.play_cue(settings.cue);
        }

        let channel = if !settings.notify {
            NotificationChannel::Disabled
        } else if self.sink.notification_permission_granted() {
            self.sink.show_notification(&Notification::posture_alert());
            NotificationChannel::InSession
        } else {
            self.relay.send(&RelayMessage::bad_posture(ALERT_MESSAGE));
            NotificationChannel::Relay
        };

        if self.flash.is_none() {
            self.sink.set_title(ALERT_TITLE);
            self.flash = Some(TitleFlash {
                last_toggle: now,
                showing_alert: true,
            });
        }

        info!(?channel, sound = settings.sound, "posture alert dispatched");
        channel
    }

    pub fn clear(&mut self) {
        if self.overlay_shown_at.take().is_some() {
            self.sink.set_overlay_visible(false);
        }
        if self.flash.take().is_some() {
            self.sink.set_title(DEFAULT_TITLE);
            debug!("title flash stopped");
        }
    }

    pub fn tick(&mut self, now: f64) {
        let hide_after = OVERLAY_AUTO_HIDE.as_secs_f64() * 1000.0;
        if let Some(shown_at) = self.overlay_shown_at {
            if now - shown_at >= hide_after {
                self.overlay_shown_at = None;
                self.sink.set_overlay_visible(false);
            }
        }

        let interval = TITLE_FLASH_INTERVAL.as_secs_f64() * 1000.0;
        if let Some(flash) = self.flash.as_mut() {
            if now - flash.last_toggle >= interval {
                flash.showing_alert = !flash.showing_alert;
                flash.last_toggle = now;
                let title = if flash.showing_alert { ALERT_TITLE } else { DEFAULT_TITLE };
                self.sink.set_title(title);
            }
        }
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_shown_at.is_some()
    }

    pub fn is_flashing(&self) -> bool {
        self.flash.is_some()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Overlay(bool),
        Cue(SoundCue),
        Notification(String),
        Title(String),
    }

    #[derive(Default)]
    struct RecordingSink {
        permission: bool,
        events: Vec<Event>,
    }

    impl AlertSink for RecordingSink {
        fn set_overlay_visible(&mut self, visible: bool) {
            self.events.push(Event::Overlay(visible));
        }
        fn play_cue(&mut self, cue: SoundCue) {
            self.events.push(Event::Cue(cue));
        }
        fn notification_permission_granted(&self) -> bool {
            self.permission
        }
        fn show_notification(&mut self, notification: &Notification) {
            self.events.push(Event::Notification(notification.tag.clone()));
        }
        fn set_title(&mut self, title: &str) {
            self.events.push(Event::Title(title.to_string()));
        }
    }

    #[derive(Default)]
    struct RecordingRelay {
        sent: RefCell<Vec<RelayMessage>>,
    }

    impl RelaySink for RecordingRelay {
        fn send(&self, message: &RelayMessage) {
            self.sent.borrow_mut().push(message.clone());
        }
    }

    fn dispatcher(permission: bool) -> AlertDispatcher<RecordingSink, RecordingRelay> {
        AlertDispatcher::new(
            RecordingSink {
                permission,
                events: Vec::new(),
            },
            RecordingRelay::default(),
        )
    }

    #[test]
    fn granted_permission_uses_in_session_notification_only() {
        let mut d = dispatcher(true);
        let channel = d.fire(0.0, &DispatchSettings::default());

        assert_eq!(channel, NotificationChannel::InSession);
        assert!(d.relay().sent.borrow().is_empty());
        assert!(d
            .sink()
            .events
            .contains(&Event::Notification(NOTIFICATION_TAG.to_string())));
    }

    #[test]
    fn missing_permission_falls_back_to_relay_only() {
        let mut d = dispatcher(false);
        let channel = d.fire(0.0, &DispatchSettings::default());

        assert_eq!(channel, NotificationChannel::Relay);
        let sent = d.relay().sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, "bad-posture");
        assert!(!d
            .sink()
            .events
            .iter()
            .any(|e| matches!(e, Event::Notification(_))));
    }

    #[test]
    fn disabled_sound_and_notify_only_show_overlay_and_title() {
        let mut d = dispatcher(true);
        let settings = DispatchSettings {
            sound: false,
            notify: false,
            cue: SoundCue::Bell,
        };
        assert_eq!(d.fire(0.0, &settings), NotificationChannel::Disabled);
        assert_eq!(
            d.sink().events,
            vec![Event::Overlay(true), Event::Title(ALERT_TITLE.to_string())]
        );
    }

    #[test]
    fn selected_cue_is_played() {
        let mut d = dispatcher(true);
        let settings = DispatchSettings {
            cue: SoundCue::Pop,
            ..DispatchSettings::default()
        };
        d.fire(0.0, &settings);
        assert!(d.sink().events.contains(&Event::Cue(SoundCue::Pop)));
    }

    #[test]
    fn overlay_auto_hides_after_five_seconds() {
        let mut d = dispatcher(true);
        d.fire(0.0, &DispatchSettings::default());
        d.tick(4_999.0);
        assert!(d.overlay_visible());
        d.tick(5_000.0);
        assert!(!d.overlay_visible());
        assert_eq!(d.sink().events.last(), Some(&Event::Overlay(false)));
        // Title keeps flashing while the episode continues
        assert!(d.is_flashing());
    }

    #[test]
    fn refire_after_auto_hide_shows_overlay_again() {
        let mut d = dispatcher(true);
        let settings = DispatchSettings::default();
        d.handle(AlertAction::Fire, 0.0, &settings);
        d.handle(AlertAction::None, 5_000.0, &settings);
        assert!(!d.overlay_visible());
        d.sink_mut().events.clear();

        d.handle(AlertAction::Fire, 30_000.0, &settings);
        assert!(d.overlay_visible());
        assert_eq!(d.sink().events.first(), Some(&Event::Overlay(true)));
        assert_eq!(
            d.sink().events.iter().filter(|e| **e == Event::Overlay(true)).count(),
            1
        );
    }

    #[test]
    fn title_alternates_every_interval_until_clear() {
        let mut d = dispatcher(true);
        d.fire(0.0, &DispatchSettings::default());
        d.sink_mut().events.clear();

        d.tick(400.0);
        d.tick(800.0);
        d.tick(1_600.0);
        assert_eq!(
            d.sink().events,
            vec![
                Event::Title(DEFAULT_TITLE.to_string()),
                Event::Title(ALERT_TITLE.to_string()),
            ]
        );

        d.handle(AlertAction::Clear, 1_700.0, &DispatchSettings::default());
        assert!(!d.is_flashing());
        assert!(!d.overlay_visible());
        assert_eq!(d.sink().events.last(), Some(&Event::Title(DEFAULT_TITLE.to_string())));
    }

    #[test]
    fn clear_without_active_alert_touches_nothing() {
        let mut d = dispatcher(true);
        d.handle(AlertAction::Clear, 0.0, &DispatchSettings::default());
        assert!(d.sink().events.is_empty());
    }

    #[test]
    fn relay_message_wire_format() {
        let json = serde_json::to_value(RelayMessage::bad_posture("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "bad-posture", "message": "hi"}));
    }
}
