//! User-visible notifications (the toast of a UI, a log line in the CLI).

use std::fmt;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Success, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Error, title, description)
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Where notifications go.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Success => log::info!("{}", notification),
            Severity::Error => log::error!("{}", notification),
        }
    }
}

/// Keeps every notification in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.notify(Notification::error("Camera Error", "denied"));
        sink.notify(Notification::success("Capture Complete", "done"));

        let received = sink.notifications();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].severity, Severity::Error);
        assert_eq!(received[1].title, "Capture Complete");
    }

    #[test]
    fn test_display() {
        let n = Notification::new(Severity::Success, "Title", "body");
        assert_eq!(n.to_string(), "Title: body");
    }

    #[test]
    fn test_constructors_set_severity() {
        assert_eq!(Notification::success("a", "b").severity, Severity::Success);
        assert_eq!(Notification::error("a", "b").severity, Severity::Error);
    }
}
