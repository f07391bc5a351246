//! Geometry and identity types shared by the search, guard and gesture modules

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the screen in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Screen-space rectangle, edges in pixels. All four edges count as inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Center of the rectangle. Computed in floating point so odd sizes keep their half pixel.
    pub fn center(&self) -> Point {
        Point {
            x: (f64::from(self.left) + f64::from(self.right)) / 2.0,
            y: (f64::from(self.top) + f64::from(self.bottom)) / 2.0,
        }
    }

    /// Inclusive containment check used to validate tap targets
    pub fn contains(&self, point: Point) -> bool {
        point.x >= f64::from(self.left)
            && point.x <= f64::from(self.right)
            && point.y >= f64::from(self.top)
            && point.y <= f64::from(self.bottom)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Display size, read once per search pass from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
}

impl ScreenGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Identity token for duplicate suppression.
///
/// Derived from the element's content (class name, text, bounds) rather than the
/// host's transient object identity, so a rebuilt tree showing the same element
/// yields the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementIdentity(pub u64);

impl ElementIdentity {
    pub fn from_parts(class_name: &str, text: Option<&str>, bounds: Rect) -> Self {
        let mut to_hash = String::with_capacity(class_name.len() + 48);
        to_hash.push_str(class_name);
        to_hash.push('\u{1f}');
        if let Some(text) = text {
            to_hash.push_str(text);
        }
        to_hash.push('\u{1f}');
        to_hash.push_str(&format!(
            "{}:{}:{}:{}",
            bounds.left, bounds.top, bounds.right, bounds.bottom
        ));

        let hash = blake3::hash(to_hash.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        ElementIdentity(u64::from_le_bytes(prefix))
    }
}

impl fmt::Display for ElementIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Result of a successful search: who matched and where to tap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate {
    pub identity: ElementIdentity,
    pub point: Point,
}
