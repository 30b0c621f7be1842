use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::recording::model::WeatherStrength;

const RECORDER_TITLE: &str = "Abyssal.Space recorder";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    fn new(title: &str, message: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// Receives operator-facing notifications. Implementations must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications into a bounded channel, dropping them when the
/// consumer falls behind.
#[derive(Clone)]
pub struct ChannelNotificationSink {
    tx: mpsc::Sender<Notification>,
}

pub fn notification_channel(
    capacity: usize,
) -> (ChannelNotificationSink, mpsc::Receiver<Notification>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelNotificationSink { tx }, rx)
}

impl NotificationSink for ChannelNotificationSink {
    fn notify(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(notification)) => {
                tracing::warn!(title = %notification.title, "Notification queue full, dropping notification");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Notification receiver dropped");
            }
        }
    }
}

/// Writes notifications to the log only.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, notification: Notification) {
        tracing::info!(title = %notification.title, "{}", notification.message);
    }
}

pub(crate) fn emit_session_starting(sink: &dyn NotificationSink) {
    sink.notify(Notification::new(
        "Recording starting...",
        "CTRL+A, CTRL+C your inventory",
    ));
}

pub(crate) fn emit_initial_loot_captured(sink: &dyn NotificationSink) {
    sink.notify(Notification::new(
        "Abyssal.Space recording started...",
        "Initial cargo received, awaiting cargo after filament activation",
    ));
}

pub(crate) fn emit_loot_captured(sink: &dyn NotificationSink) {
    sink.notify(Notification::new(
        RECORDER_TITLE,
        "Loot captured from clipboard!",
    ));
}

pub(crate) fn emit_weather_reminder(sink: &dyn NotificationSink) {
    sink.notify(Notification::new("Reminder", "Please record weather strength!"));
}

pub(crate) fn emit_weather_strength_set(sink: &dyn NotificationSink, strength: WeatherStrength) {
    sink.notify(Notification::new(
        RECORDER_TITLE,
        format!("Weather strength set to: {}%", strength.percent()),
    ));
}

pub(crate) fn emit_recording_encoded(sink: &dyn NotificationSink, recording_path: &str) {
    sink.notify(Notification::new(
        RECORDER_TITLE,
        format!("Abyss run successfully recorded to file: {recording_path}"),
    ));
}

pub(crate) fn emit_nothing_captured(sink: &dyn NotificationSink) {
    sink.notify(Notification::new(
        RECORDER_TITLE,
        "There were no frames captured, skipping recording of abyss run",
    ));
}

pub(crate) fn emit_recording_failed(sink: &dyn NotificationSink, error_message: &str) {
    sink.notify(Notification::new(
        RECORDER_TITLE,
        format!("Failed to record abyss run: {error_message}"),
    ));
}
