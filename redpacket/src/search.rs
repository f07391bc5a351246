//! Tree searches over one event pass's snapshot.
//!
//! Both searches only borrow the root. Every handle acquired while walking is
//! dropped (and so released to the host) before the walk moves to the next
//! sibling, so a search never accumulates handles.

use crate::config::SearchConfig;
use crate::element::UIElement;
use crate::errors::AutomationError;
use crate::types::{MatchCandidate, Point, ScreenGeometry};
use tracing::{debug, instrument, trace, warn};

/// A keyword match: the last node carrying the highest-priority keyword found
#[derive(Debug)]
pub struct RewardHit {
    pub keyword: String,
    pub node: UIElement,
}

#[derive(Debug, Clone, Default)]
pub struct NodeSearch {
    config: SearchConfig,
}

impl NodeSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Depth-first, pre-order search for the popup's unlabeled open button.
    ///
    /// A node qualifies when its class name contains one of the button
    /// markers, it has no text, and the center of its bounds lies inside both
    /// screen bands. The first qualifying node in traversal order wins.
    #[instrument(level = "debug", skip(self, root))]
    pub fn find_open_button(
        &self,
        root: &UIElement,
        screen: ScreenGeometry,
    ) -> Result<Option<MatchCandidate>, AutomationError> {
        if screen.width == 0 || screen.height == 0 {
            return Err(AutomationError::InvalidArgument(format!(
                "degenerate screen geometry {}x{}",
                screen.width, screen.height
            )));
        }
        self.visit_for_button(root, screen, 0)
    }

    fn visit_for_button(
        &self,
        node: &UIElement,
        screen: ScreenGeometry,
        depth: usize,
    ) -> Result<Option<MatchCandidate>, AutomationError> {
        if let Some(point) = self.open_button_center(node, screen) {
            debug!(
                class_name = ?node.class_name(),
                x = point.x,
                y = point.y,
                "open button located"
            );
            return Ok(Some(MatchCandidate {
                identity: node.identity()?,
                point,
            }));
        }

        if depth >= self.config.max_depth {
            debug!(depth, "search depth limit reached, skipping subtree");
            return Ok(None);
        }

        for index in 0..node.child_count() {
            let child = match node.child(index) {
                Ok(Some(child)) => child,
                Ok(None) => continue,
                Err(e) => {
                    debug!(index, "skipping unreadable child: {}", e);
                    continue;
                }
            };
            if let Some(found) = self.visit_for_button(&child, screen, depth + 1)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Center of `node` if it qualifies as the open button
    fn open_button_center(&self, node: &UIElement, screen: ScreenGeometry) -> Option<Point> {
        let class_name = node.class_name()?;
        if !self
            .config
            .button_class_markers
            .iter()
            .any(|marker| class_name.contains(marker.as_str()))
        {
            return None;
        }
        if node.text().is_some_and(|t| !t.is_empty()) {
            return None;
        }
        let bounds = match node.bounds() {
            Ok(bounds) => bounds,
            Err(e) => {
                trace!("button candidate without bounds: {}", e);
                return None;
            }
        };
        let center = bounds.center();
        let inside = self.config.horizontal_band.contains(center.x, screen.width)
            && self.config.vertical_band.contains(center.y, screen.height);
        inside.then_some(center)
    }

    /// Keyword search. For each keyword in priority order, collect every node
    /// whose text contains it and keep the last one; stop at the first keyword
    /// that matches anything.
    #[instrument(level = "debug", skip(self, root, keywords))]
    pub fn find_reward_node<S: AsRef<str>>(
        &self,
        root: &UIElement,
        keywords: &[S],
    ) -> Result<Option<RewardHit>, AutomationError> {
        for keyword in keywords {
            let keyword = keyword.as_ref();
            let mut nodes = root.find_by_text(keyword, self.config.max_depth)?;
            debug!(keyword, count = nodes.len(), "keyword search");
            // The last match is the most recently added on screen
            if let Some(node) = nodes.pop() {
                return Ok(Some(RewardHit {
                    keyword: keyword.to_string(),
                    node,
                }));
            }
        }
        Ok(None)
    }

    /// Keyword search resolved to a tap target.
    ///
    /// The identity is the matched node's; the point is the center of the
    /// node itself when clickable, otherwise of its nearest clickable
    /// ancestor. A match with no clickable ancestor yields `None`.
    pub fn find_reward_element<S: AsRef<str>>(
        &self,
        root: &UIElement,
        keywords: &[S],
    ) -> Result<Option<MatchCandidate>, AutomationError> {
        let Some(hit) = self.find_reward_node(root, keywords)? else {
            return Ok(None);
        };
        let identity = hit.node.identity()?;
        match self.click_target_center(&hit.node)? {
            Some(point) => Ok(Some(MatchCandidate { identity, point })),
            None => {
                debug!(keyword = %hit.keyword, "matched node has no clickable ancestor");
                Ok(None)
            }
        }
    }

    /// Center of the nearest clickable node on the path from `node` to the root
    pub fn click_target_center(&self, node: &UIElement) -> Result<Option<Point>, AutomationError> {
        if node.is_clickable() {
            return Ok(Some(node.center()?));
        }
        let mut current = node.parent()?;
        let mut hops = 0;
        while let Some(ancestor) = current {
            if ancestor.is_clickable() {
                return Ok(Some(ancestor.center()?));
            }
            hops += 1;
            if hops >= self.config.max_depth {
                debug!(hops, "parent walk limit reached");
                return Ok(None);
            }
            current = ancestor.parent()?;
        }
        Ok(None)
    }
}

/// Click `node`, or the nearest clickable ancestor when `node` itself is not
/// clickable. At most `max_depth` ancestors are visited. Returns `false` when
/// no ancestor is clickable or the host rejects the action.
#[instrument(level = "debug", skip(node))]
pub fn click_or_delegate_to_parent(node: &UIElement, max_depth: usize) -> bool {
    if node.is_clickable() {
        return perform(node);
    }
    let mut current = match node.parent() {
        Ok(parent) => parent,
        Err(e) => {
            debug!("parent lookup failed: {}", e);
            return false;
        }
    };
    let mut hops = 0;
    while let Some(ancestor) = current {
        if ancestor.is_clickable() {
            return perform(&ancestor);
        }
        hops += 1;
        if hops >= max_depth {
            debug!(hops, "parent walk limit reached");
            return false;
        }
        current = match ancestor.parent() {
            Ok(parent) => parent,
            Err(e) => {
                debug!("parent lookup failed: {}", e);
                return false;
            }
        };
    }
    debug!("click failed: no clickable ancestor");
    false
}

fn perform(node: &UIElement) -> bool {
    debug!(class_name = ?node.class_name(), "clicking node");
    match node.perform_click() {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!("click action failed: {}", e);
            false
        }
    }
}
