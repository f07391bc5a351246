use crate::events::NotificationPayload;
use crate::gesture::GestureDescription;
use crate::types::ScreenGeometry;
use crate::{AutomationError, UIElement};

pub mod snapshot;

pub use snapshot::SnapshotEngine;

/// The capabilities the core needs from its host accessibility service.
///
/// The host owns the tree, the screen and input injection; the core only
/// borrows element handles for the duration of one event pass.
pub trait AccessibilityEngine: Send + Sync {
    /// Root of the currently active window, `None` when no window is tracked
    fn get_active_root(&self) -> Result<Option<UIElement>, AutomationError>;

    /// Current display size in pixels
    fn display_metrics(&self) -> Result<ScreenGeometry, AutomationError>;

    /// Inject a gesture on the input surface
    fn dispatch_gesture(&self, gesture: &GestureDescription) -> Result<(), AutomationError>;

    /// Fire a notification's embedded open action
    fn send_intent(&self, payload: &NotificationPayload) -> Result<(), AutomationError>;
}
