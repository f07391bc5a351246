//! Red packet detection and tap automation over accessibility events
//!
//! The host (an accessibility service) pushes [`AccessibilityEvent`]s into an
//! [`AutomationEngine`]. The engine decides what just appeared on screen,
//! whether it was already handled, and schedules a randomized tap through a
//! [`GestureDispatcher`] or fires a notification's open action directly.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod classifier;
pub mod config;
pub mod element;
pub mod engine;
pub mod errors;
pub mod events;
pub mod gesture;
pub mod guard;
pub mod platforms;
pub mod search;
#[cfg(test)]
mod tests;
pub mod types;

pub use classifier::{Action, EventClassifier};
pub use config::{Band, ClickStrategy, EngineConfig, SearchConfig};
pub use element::{UIElement, UIElementAttributes, UIElementImpl};
pub use engine::{AutomationEngine, EngineStats, EventOutcome, MatchSource};
pub use errors::AutomationError;
pub use events::{AccessibilityEvent, EventType, NotificationPayload};
pub use gesture::{
    GestureDescription, GestureDispatcher, ManualScheduler, Scheduler, StrokeDescription,
    TapDelay, TokioScheduler,
};
pub use guard::{DuplicateGuard, DuplicateGuardState};
pub use platforms::{AccessibilityEngine, SnapshotEngine};
pub use search::{click_or_delegate_to_parent, NodeSearch, RewardHit};
pub use types::{ElementIdentity, MatchCandidate, Point, Rect, ScreenGeometry};

/// Represents a node in a serialized UI tree, containing its attributes and children.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct UINode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub attributes: UIElementAttributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UINode>,
}

impl fmt::Debug for UINode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_with_depth(f, 0, 100)
    }
}

impl UINode {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            id: None,
            attributes: UIElementAttributes {
                class_name: class_name.into(),
                ..Default::default()
            },
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.attributes.text = Some(text.into());
        self
    }

    pub fn with_bounds(mut self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        self.attributes.bounds = Rect::new(left, top, right, bottom);
        self
    }

    pub fn clickable(mut self) -> Self {
        self.attributes.clickable = true;
        self
    }

    pub fn with_child(mut self, child: UINode) -> Self {
        self.children.push(child);
        self
    }

    /// Load a tree from its JSON form
    pub fn from_json(json: &str) -> Result<Self, AutomationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Helper method for debug formatting with depth control
    fn debug_with_depth(
        &self,
        f: &mut fmt::Formatter<'_>,
        current_depth: usize,
        max_depth: usize,
    ) -> fmt::Result {
        let mut debug_struct = f.debug_struct("UINode");
        if let Some(ref id) = self.id {
            debug_struct.field("id", id);
        }
        debug_struct.field("attributes", &self.attributes);

        if !self.children.is_empty() {
            if current_depth < max_depth {
                debug_struct.field(
                    "children",
                    &DebugChildrenWithDepth {
                        children: &self.children,
                        current_depth,
                        max_depth,
                    },
                );
            } else {
                debug_struct.field(
                    "children",
                    &format!("[{} children (depth limit reached)]", self.children.len()),
                );
            }
        }

        debug_struct.finish()
    }
}

/// Helper struct for debug formatting children with depth control
struct DebugChildrenWithDepth<'a> {
    children: &'a [UINode],
    current_depth: usize,
    max_depth: usize,
}

impl fmt::Debug for DebugChildrenWithDepth<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for child in self.children {
            list.entry(&DebugNodeWithDepth {
                node: child,
                current_depth: self.current_depth + 1,
                max_depth: self.max_depth,
            });
        }
        list.finish()
    }
}

struct DebugNodeWithDepth<'a> {
    node: &'a UINode,
    current_depth: usize,
    max_depth: usize,
}

impl fmt::Debug for DebugNodeWithDepth<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node
            .debug_with_depth(f, self.current_depth, self.max_depth)
    }
}
