mod search_tests;

use crate::{ScreenGeometry, SnapshotEngine, UINode};

pub const SCREEN: ScreenGeometry = ScreenGeometry {
    width: 1000,
    height: 2000,
};

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_test_writer()
        .try_init();
}

/// Full-screen window root with the given children
pub fn window(children: Vec<UINode>) -> UINode {
    let mut root = UINode::new("android.widget.FrameLayout").with_bounds(0, 0, 1000, 2000);
    root.children = children;
    root
}

/// Text-less button whose bounds are centered exactly on (cx, cy)
pub fn button_at(cx: i32, cy: i32) -> UINode {
    UINode::new("android.widget.Button").with_bounds(cx - 20, cy - 20, cx + 20, cy + 20)
}

pub fn engine_with(tree: UINode) -> SnapshotEngine {
    SnapshotEngine::from_tree(tree, SCREEN)
}
