use crate::errors::AutomationError;
use crate::types::{ElementIdentity, Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use tracing::{debug, instrument, trace};

/// Represents a node in the host's live accessibility tree.
///
/// A `UIElement` is a non-owning view: the tree belongs to the host and may
/// change at any time. The handle is released back to the host when it is
/// dropped, so holding one past the event pass it came from is a bug.
#[derive(Debug)]
pub struct UIElement {
    inner: Box<dyn UIElementImpl>,
}

/// Helper functions for clean serialization
fn is_empty_string(opt: &Option<String>) -> bool {
    match opt {
        Some(s) => s.is_empty(),
        None => true,
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Attributes associated with a UI element
#[derive(Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UIElementAttributes {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class_name: String,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub text: Option<String>,
    #[serde(default)]
    pub bounds: Rect,
    #[serde(default, skip_serializing_if = "is_false")]
    pub clickable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_count: Option<usize>,
}

impl fmt::Debug for UIElementAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug_struct = f.debug_struct("UIElementAttributes");

        if !self.class_name.is_empty() {
            debug_struct.field("class_name", &self.class_name);
        }

        if let Some(ref text) = self.text {
            if !text.is_empty() {
                debug_struct.field("text", text);
            }
        }

        debug_struct.field("bounds", &self.bounds);

        // Only show clickable if true
        if self.clickable {
            debug_struct.field("clickable", &true);
        }

        if let Some(count) = self.child_count {
            debug_struct.field("child_count", &count);
        }

        debug_struct.finish()
    }
}

/// Interface for host-specific element implementations
pub trait UIElementImpl: Send + Sync + Debug {
    fn class_name(&self) -> Option<String>;
    fn text(&self) -> Option<String>;
    fn is_clickable(&self) -> bool;
    fn bounds(&self) -> Result<Rect, AutomationError>;
    fn child_count(&self) -> usize;
    /// Acquire the child at `index`. `Ok(None)` when the host has no node there anymore.
    fn child(&self, index: usize) -> Result<Option<UIElement>, AutomationError>;
    fn parent(&self) -> Result<Option<UIElement>, AutomationError>;
    /// Trigger the node's primary (click) action. Returns whether the host accepted it.
    fn perform_click(&self) -> Result<bool, AutomationError>;

    /// Return every node in this subtree (self included) whose text contains `needle`,
    /// in pre-order. Hosts with a native text query should override this.
    fn find_by_text(
        &self,
        needle: &str,
        max_depth: usize,
    ) -> Result<Vec<UIElement>, AutomationError> {
        let mut found = Vec::new();
        if self.text().is_some_and(|t| t.contains(needle)) {
            // The root itself is borrowed, so hand back a fresh handle to it
            if let Some(own) = self.reacquire()? {
                found.push(own);
            }
        }
        if max_depth > 0 {
            for index in 0..self.child_count() {
                if let Some(child) = readable_child(self.child(index), index) {
                    collect_by_text(&child, needle, max_depth - 1, &mut found)?;
                }
            }
        }
        Ok(found)
    }

    /// Obtain an independent handle to the same node.
    fn reacquire(&self) -> Result<Option<UIElement>, AutomationError>;

    /// Give the handle back to the host. Called exactly once, from `Drop`.
    fn release(&self) {}

    fn attributes(&self) -> UIElementAttributes {
        UIElementAttributes {
            class_name: self.class_name().unwrap_or_default(),
            text: self.text(),
            bounds: self.bounds().unwrap_or_default(),
            clickable: self.is_clickable(),
            child_count: Some(self.child_count()),
        }
    }
}

/// Pre-order text collection. `element` is kept if it matches, dropped otherwise.
fn collect_by_text(
    element: &UIElement,
    needle: &str,
    depth_left: usize,
    found: &mut Vec<UIElement>,
) -> Result<(), AutomationError> {
    if element.text().is_some_and(|t| t.contains(needle)) {
        if let Some(own) = element.inner.reacquire()? {
            found.push(own);
        }
    }
    if depth_left == 0 {
        trace!("text search depth limit reached");
        return Ok(());
    }
    for index in 0..element.child_count() {
        if let Some(child) = readable_child(element.child(index), index) {
            collect_by_text(&child, needle, depth_left - 1, found)?;
        }
    }
    Ok(())
}

/// A child the host failed to hand out is skipped, not fatal to the walk
fn readable_child(
    child: Result<Option<UIElement>, AutomationError>,
    index: usize,
) -> Option<UIElement> {
    match child {
        Ok(child) => child,
        Err(e) => {
            debug!(index, "skipping unreadable child: {}", e);
            None
        }
    }
}

impl UIElement {
    /// Create a new UI element from a host-specific implementation
    pub fn new(impl_: Box<dyn UIElementImpl>) -> Self {
        Self { inner: impl_ }
    }

    /// Get the element's class name (e.g., "android.widget.Button")
    pub fn class_name(&self) -> Option<String> {
        self.inner.class_name()
    }

    pub fn text(&self) -> Option<String> {
        self.inner.text()
    }

    pub fn is_clickable(&self) -> bool {
        self.inner.is_clickable()
    }

    /// Get element bounds in screen coordinates
    pub fn bounds(&self) -> Result<Rect, AutomationError> {
        self.inner.bounds()
    }

    /// Center of the element's bounds
    pub fn center(&self) -> Result<Point, AutomationError> {
        Ok(self.inner.bounds()?.center())
    }

    pub fn child_count(&self) -> usize {
        self.inner.child_count()
    }

    pub fn child(&self, index: usize) -> Result<Option<UIElement>, AutomationError> {
        self.inner.child(index)
    }

    /// Get parent element
    pub fn parent(&self) -> Result<Option<UIElement>, AutomationError> {
        self.inner.parent()
    }

    /// Trigger the element's click action
    #[instrument(level = "debug", skip(self))]
    pub fn perform_click(&self) -> Result<bool, AutomationError> {
        self.inner.perform_click()
    }

    pub fn find_by_text(
        &self,
        needle: &str,
        max_depth: usize,
    ) -> Result<Vec<UIElement>, AutomationError> {
        self.inner.find_by_text(needle, max_depth)
    }

    /// Get all attributes of the element
    pub fn attributes(&self) -> UIElementAttributes {
        self.inner.attributes()
    }

    /// Content-derived identity used for duplicate suppression
    pub fn identity(&self) -> Result<ElementIdentity, AutomationError> {
        let class_name = self.class_name().unwrap_or_default();
        let text = self.text();
        let bounds = self.bounds()?;
        Ok(ElementIdentity::from_parts(
            &class_name,
            text.as_deref(),
            bounds,
        ))
    }
}

impl Drop for UIElement {
    fn drop(&mut self) {
        self.inner.release();
    }
}
