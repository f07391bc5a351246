//! In-memory host built from a serialized [`UINode`] tree.
//!
//! Used by the replay CLI and the tests. It records every gesture, intent and
//! click it receives and counts live element handles, so callers can check
//! that nothing leaks past an event pass.

use super::AccessibilityEngine;
use crate::element::{UIElementAttributes, UIElementImpl};
use crate::events::NotificationPayload;
use crate::gesture::GestureDescription;
use crate::types::{Rect, ScreenGeometry};
use crate::{AutomationError, UIElement, UINode};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

#[derive(Debug)]
struct NodeRecord {
    attributes: UIElementAttributes,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug, Default)]
struct SnapshotState {
    /// Bumped on every tree swap; handles from older generations are stale
    generation: u64,
    nodes: Vec<NodeRecord>,
    screen: Option<ScreenGeometry>,
    live_handles: usize,
    acquired_handles: usize,
    gestures: Vec<GestureDescription>,
    intents: Vec<NotificationPayload>,
    clicks: Vec<UIElementAttributes>,
    fail_gestures: bool,
    fail_intents: bool,
}

impl SnapshotState {
    fn load(&mut self, tree: Option<UINode>) {
        self.generation += 1;
        self.nodes.clear();
        if let Some(root) = tree {
            flatten(root, None, &mut self.nodes);
        }
        debug!(
            generation = self.generation,
            nodes = self.nodes.len(),
            "snapshot tree loaded"
        );
    }
}

/// Pre-order flattening, root at index 0
fn flatten(node: UINode, parent: Option<usize>, nodes: &mut Vec<NodeRecord>) -> usize {
    let index = nodes.len();
    nodes.push(NodeRecord {
        attributes: node.attributes,
        parent,
        children: Vec::with_capacity(node.children.len()),
    });
    for child in node.children {
        let child_index = flatten(child, Some(index), nodes);
        nodes[index].children.push(child_index);
    }
    index
}

fn lock(state: &Mutex<SnapshotState>) -> MutexGuard<'_, SnapshotState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn acquire(state: &Arc<Mutex<SnapshotState>>, index: usize) -> UIElement {
    let generation = {
        let mut s = lock(state);
        s.live_handles += 1;
        s.acquired_handles += 1;
        s.generation
    };
    UIElement::new(Box::new(SnapshotElement {
        state: state.clone(),
        index,
        generation,
    }))
}

/// Host implementation over a static tree snapshot
#[derive(Clone, Default)]
pub struct SnapshotEngine {
    state: Arc<Mutex<SnapshotState>>,
}

impl fmt::Debug for SnapshotEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = lock(&self.state);
        f.debug_struct("SnapshotEngine")
            .field("generation", &s.generation)
            .field("nodes", &s.nodes.len())
            .field("screen", &s.screen)
            .field("live_handles", &s.live_handles)
            .finish()
    }
}

impl SnapshotEngine {
    /// Engine with no window and no display metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tree(tree: UINode, screen: ScreenGeometry) -> Self {
        let engine = Self::new();
        engine.set_tree(Some(tree));
        engine.set_screen(Some(screen));
        engine
    }

    /// Replace the active window tree. Outstanding handles become stale.
    pub fn set_tree(&self, tree: Option<UINode>) {
        lock(&self.state).load(tree);
    }

    pub fn set_tree_json(&self, json: &str) -> Result<(), AutomationError> {
        let tree: UINode = serde_json::from_str(json)?;
        self.set_tree(Some(tree));
        Ok(())
    }

    pub fn set_screen(&self, screen: Option<ScreenGeometry>) {
        lock(&self.state).screen = screen;
    }

    /// Make every subsequent gesture injection fail
    pub fn fail_gestures(&self, fail: bool) {
        lock(&self.state).fail_gestures = fail;
    }

    /// Make every subsequent intent invocation fail
    pub fn fail_intents(&self, fail: bool) {
        lock(&self.state).fail_intents = fail;
    }

    pub fn gestures(&self) -> Vec<GestureDescription> {
        lock(&self.state).gestures.clone()
    }

    pub fn intents(&self) -> Vec<NotificationPayload> {
        lock(&self.state).intents.clone()
    }

    /// Attributes of every node whose click action was performed, in order
    pub fn clicks(&self) -> Vec<UIElementAttributes> {
        lock(&self.state).clicks.clone()
    }

    /// Handles currently acquired and not yet released
    pub fn live_handles(&self) -> usize {
        lock(&self.state).live_handles
    }

    /// Total handles ever acquired
    pub fn acquired_handles(&self) -> usize {
        lock(&self.state).acquired_handles
    }
}

impl AccessibilityEngine for SnapshotEngine {
    fn get_active_root(&self) -> Result<Option<UIElement>, AutomationError> {
        let has_root = !lock(&self.state).nodes.is_empty();
        Ok(has_root.then(|| acquire(&self.state, 0)))
    }

    fn display_metrics(&self) -> Result<ScreenGeometry, AutomationError> {
        lock(&self.state).screen.ok_or_else(|| {
            AutomationError::PlatformError("Display metrics unavailable".to_string())
        })
    }

    fn dispatch_gesture(&self, gesture: &GestureDescription) -> Result<(), AutomationError> {
        let mut s = lock(&self.state);
        if s.fail_gestures {
            return Err(AutomationError::ActionFailed(
                "Gesture rejected by host".to_string(),
            ));
        }
        s.gestures.push(gesture.clone());
        Ok(())
    }

    fn send_intent(&self, payload: &NotificationPayload) -> Result<(), AutomationError> {
        let mut s = lock(&self.state);
        if s.fail_intents {
            return Err(AutomationError::ActionFailed(format!(
                "Intent {} was cancelled",
                payload.intent_id
            )));
        }
        s.intents.push(payload.clone());
        Ok(())
    }
}

struct SnapshotElement {
    state: Arc<Mutex<SnapshotState>>,
    index: usize,
    generation: u64,
}

impl fmt::Debug for SnapshotElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotElement")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

impl SnapshotElement {
    /// Run `f` against this element's record, or `None` if the handle is stale
    fn with_record<T>(&self, f: impl FnOnce(&NodeRecord) -> T) -> Option<T> {
        let s = lock(&self.state);
        if s.generation != self.generation {
            return None;
        }
        s.nodes.get(self.index).map(f)
    }

    fn stale(&self) -> AutomationError {
        AutomationError::StaleElement(format!(
            "node {} from generation {}",
            self.index, self.generation
        ))
    }
}

impl UIElementImpl for SnapshotElement {
    fn class_name(&self) -> Option<String> {
        self.with_record(|r| r.attributes.class_name.clone())
            .filter(|c| !c.is_empty())
    }

    fn text(&self) -> Option<String> {
        self.with_record(|r| r.attributes.text.clone()).flatten()
    }

    fn is_clickable(&self) -> bool {
        self.with_record(|r| r.attributes.clickable)
            .unwrap_or(false)
    }

    fn bounds(&self) -> Result<Rect, AutomationError> {
        self.with_record(|r| r.attributes.bounds)
            .ok_or_else(|| self.stale())
    }

    fn child_count(&self) -> usize {
        self.with_record(|r| r.children.len()).unwrap_or(0)
    }

    fn child(&self, index: usize) -> Result<Option<UIElement>, AutomationError> {
        let child_index = self
            .with_record(|r| r.children.get(index).copied())
            .ok_or_else(|| self.stale())?;
        Ok(child_index.map(|i| acquire(&self.state, i)))
    }

    fn parent(&self) -> Result<Option<UIElement>, AutomationError> {
        let parent_index = self
            .with_record(|r| r.parent)
            .ok_or_else(|| self.stale())?;
        Ok(parent_index.map(|i| acquire(&self.state, i)))
    }

    fn perform_click(&self) -> Result<bool, AutomationError> {
        let attributes = self
            .with_record(|r| r.attributes.clone())
            .ok_or_else(|| self.stale())?;
        let accepted = attributes.clickable;
        trace!(index = self.index, accepted, "click performed on snapshot node");
        lock(&self.state).clicks.push(attributes);
        Ok(accepted)
    }

    fn reacquire(&self) -> Result<Option<UIElement>, AutomationError> {
        if self.with_record(|_| ()).is_none() {
            return Ok(None);
        }
        Ok(Some(acquire(&self.state, self.index)))
    }

    fn release(&self) {
        let mut s = lock(&self.state);
        s.live_handles = s.live_handles.saturating_sub(1);
    }
}
