use crate::events::{AccessibilityEvent, EventType};
use tracing::debug;

/// Routing decision for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    HandleNotification,
    HandleWindowChange,
    Ignore,
}

/// Filters events by source package and maps event types to handlers
#[derive(Debug, Clone)]
pub struct EventClassifier {
    target_package: String,
}

impl EventClassifier {
    pub fn new(target_package: impl Into<String>) -> Self {
        Self {
            target_package: target_package.into(),
        }
    }

    pub fn target_package(&self) -> &str {
        &self.target_package
    }

    pub fn classify(&self, event: &AccessibilityEvent) -> Action {
        if event.package_name != self.target_package {
            return Action::Ignore;
        }

        if matches!(
            event.event_type,
            EventType::NotificationStateChanged | EventType::WindowStateChanged
        ) {
            debug!(event_type = %event.event_type, "key event received");
        }

        match event.event_type {
            EventType::NotificationStateChanged => Action::HandleNotification,
            EventType::WindowStateChanged | EventType::WindowContentChanged => {
                Action::HandleWindowChange
            }
            _ => Action::Ignore,
        }
    }
}
