use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of an incoming accessibility event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NotificationStateChanged,
    WindowStateChanged,
    WindowContentChanged,
    ViewClicked,
    ViewScrolled,
    /// Any other host event type, kept as the raw host code
    Other(u32),
}

impl EventType {
    /// Host-style event type name, used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NotificationStateChanged => "TYPE_NOTIFICATION_STATE_CHANGED",
            EventType::WindowStateChanged => "TYPE_WINDOW_STATE_CHANGED",
            EventType::WindowContentChanged => "TYPE_WINDOW_CONTENT_CHANGED",
            EventType::ViewClicked => "TYPE_VIEW_CLICKED",
            EventType::ViewScrolled => "TYPE_VIEW_SCROLLED",
            EventType::Other(_) => "TYPE_OTHER",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Other(code) => write!(f, "TYPE_OTHER({code})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// The "open" action a notification carries (its content intent).
///
/// Opaque to the core; the host knows how to fire it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub intent_id: String,
}

impl NotificationPayload {
    pub fn new(intent_id: impl Into<String>) -> Self {
        Self {
            intent_id: intent_id.into(),
        }
    }
}

/// An event delivered by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessibilityEvent {
    /// Package of the application that produced the event
    pub package_name: String,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<NotificationPayload>,
    /// Event time in milliseconds, host clock
    #[serde(default)]
    pub event_time_ms: u64,
}

impl AccessibilityEvent {
    pub fn new(package_name: impl Into<String>, event_type: EventType, event_time_ms: u64) -> Self {
        Self {
            package_name: package_name.into(),
            event_type,
            text: Vec::new(),
            payload: None,
            event_time_ms,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text.push(text.into());
        self
    }

    pub fn with_payload(mut self, payload: NotificationPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}
