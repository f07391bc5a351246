use super::{button_at, engine_with, init_tracing, window, SCREEN};
use crate::config::DEFAULT_MAX_DEPTH;
use crate::{
    click_or_delegate_to_parent, AccessibilityEngine, AutomationEngine, AutomationError,
    EngineConfig, EventOutcome, GestureDescription, ManualScheduler, MatchSource,
    NotificationPayload, NodeSearch, Point, Rect, ScreenGeometry, SearchConfig, SnapshotEngine,
    UIElement, UIElementImpl, UINode,
};
use std::sync::Arc;

const KEYWORDS: [&str; 2] = ["领取红包", "微信红包"];

fn root_of(engine: &SnapshotEngine) -> UIElement {
    engine
        .get_active_root()
        .expect("snapshot root")
        .expect("tree loaded")
}

/// Whether the default search finds a button centered at (cx, cy)
fn finds_button_at(cx: i32, cy: i32) -> bool {
    let engine = engine_with(window(vec![button_at(cx, cy)]));
    let root = root_of(&engine);
    NodeSearch::default()
        .find_open_button(&root, SCREEN)
        .expect("search")
        .is_some()
}

#[test]
fn test_open_button_in_popup() {
    init_tracing();
    let tree = window(vec![UINode::new("android.widget.LinearLayout")
        .with_bounds(100, 600, 900, 1500)
        .with_child(
            UINode::new("android.widget.TextView")
                .with_text("恭喜发财，大吉大利")
                .with_bounds(200, 700, 800, 760),
        )
        .with_child(button_at(500, 1200))]);
    let engine = engine_with(tree);
    let root = root_of(&engine);

    let found = NodeSearch::default()
        .find_open_button(&root, SCREEN)
        .unwrap()
        .expect("open button");
    assert_eq!(found.point, Point::new(500.0, 1200.0));

    drop(root);
    assert_eq!(engine.live_handles(), 0, "search leaked handles");
}

#[test]
fn test_open_button_horizontal_band_edges() {
    assert!(finds_button_at(400, 1200), "0.4 * width is inside");
    assert!(!finds_button_at(399, 1200), "0.399 * width is outside");
    assert!(finds_button_at(600, 1200), "0.6 * width is inside");
    assert!(!finds_button_at(601, 1200), "0.601 * width is outside");
}

#[test]
fn test_open_button_vertical_band_edges() {
    assert!(finds_button_at(500, 1000), "0.5 * height is inside");
    assert!(!finds_button_at(500, 999), "just above the band");
    assert!(finds_button_at(500, 1600), "0.8 * height is inside");
    assert!(!finds_button_at(500, 1601), "just below the band");
}

#[test]
fn test_open_button_requires_button_class_and_no_text() {
    let search = NodeSearch::default();
    let cases = [
        (UINode::new("android.widget.ImageButton"), true),
        (UINode::new("android.widget.Button").with_text(""), true),
        (UINode::new("android.widget.Button").with_text("開"), false),
        (UINode::new("android.widget.ImageView"), false),
        (UINode::new(""), false),
    ];
    for (node, expected) in cases {
        let node = node.with_bounds(480, 1180, 520, 1220);
        let description = format!("{:?}", node.attributes);
        let engine = engine_with(window(vec![node]));
        let root = root_of(&engine);
        let found = search.find_open_button(&root, SCREEN).unwrap();
        assert_eq!(found.is_some(), expected, "{description}");
    }
}

#[test]
fn test_open_button_pre_order() {
    // The nested button comes first in pre-order even though the sibling is shallower
    let tree = window(vec![
        UINode::new("android.widget.FrameLayout")
            .with_bounds(0, 0, 1000, 2000)
            .with_child(button_at(450, 1100)),
        button_at(550, 1300),
    ]);
    let engine = engine_with(tree);
    let root = root_of(&engine);
    let found = NodeSearch::default()
        .find_open_button(&root, SCREEN)
        .unwrap()
        .unwrap();
    assert_eq!(found.point, Point::new(450.0, 1100.0));

    // A qualifying parent is visited before its children
    let tree = window(vec![button_at(500, 1200).with_child(button_at(520, 1250))]);
    let engine = engine_with(tree);
    let root = root_of(&engine);
    let found = NodeSearch::default()
        .find_open_button(&root, SCREEN)
        .unwrap()
        .unwrap();
    assert_eq!(found.point, Point::new(500.0, 1200.0));
}

#[test]
fn test_open_button_depth_cap() {
    let tree = window(vec![UINode::new("a")
        .with_child(UINode::new("b").with_child(button_at(500, 1200)))]);
    let shallow = NodeSearch::new(SearchConfig {
        max_depth: 2,
        ..SearchConfig::default()
    });
    let deep = NodeSearch::new(SearchConfig {
        max_depth: 3,
        ..SearchConfig::default()
    });

    let engine = engine_with(tree);
    let root = root_of(&engine);
    assert!(shallow.find_open_button(&root, SCREEN).unwrap().is_none());
    assert!(deep.find_open_button(&root, SCREEN).unwrap().is_some());
    drop(root);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_open_button_rejects_degenerate_screen() {
    let engine = engine_with(window(vec![button_at(500, 1200)]));
    let root = root_of(&engine);
    let screen = crate::ScreenGeometry::new(0, 2000);
    assert!(NodeSearch::default().find_open_button(&root, screen).is_err());
}

fn chat(messages: Vec<UINode>) -> UINode {
    let mut list = UINode::new("android.widget.ListView").with_bounds(0, 100, 1000, 1900);
    list.children = messages;
    window(vec![list])
}

fn message(text: &str, top: i32) -> UINode {
    UINode::new("android.widget.LinearLayout")
        .clickable()
        .with_bounds(100, top, 700, top + 100)
        .with_child(
            UINode::new("android.widget.TextView")
                .with_text(text)
                .with_bounds(120, top + 10, 680, top + 50),
        )
}

#[test]
fn test_keyword_priority_regardless_of_tree_order() {
    for tree in [
        chat(vec![message("微信红包", 200), message("领取红包", 400)]),
        chat(vec![message("领取红包", 200), message("微信红包", 400)]),
    ] {
        let engine = engine_with(tree);
        let root = root_of(&engine);
        let hit = NodeSearch::default()
            .find_reward_node(&root, &KEYWORDS)
            .unwrap()
            .expect("match");
        assert_eq!(hit.keyword, "领取红包");
        assert_eq!(hit.node.text().as_deref(), Some("领取红包"));
    }
}

#[test]
fn test_keyword_search_takes_last_match() {
    let engine = engine_with(chat(vec![
        message("领取红包", 200),
        message("hello", 400),
        message("领取红包", 600),
    ]));
    let root = root_of(&engine);
    let hit = NodeSearch::default()
        .find_reward_node(&root, &KEYWORDS)
        .unwrap()
        .unwrap();
    assert_eq!(hit.node.bounds().unwrap().top, 610);

    drop(hit);
    drop(root);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_keyword_search_falls_through_to_second_keyword() {
    let engine = engine_with(chat(vec![message("[微信红包]恭喜发财", 200)]));
    let root = root_of(&engine);
    let hit = NodeSearch::default()
        .find_reward_node(&root, &KEYWORDS)
        .unwrap()
        .unwrap();
    assert_eq!(hit.keyword, "微信红包");

    let engine = engine_with(chat(vec![message("hello", 200)]));
    let root = root_of(&engine);
    assert!(NodeSearch::default()
        .find_reward_node(&root, &KEYWORDS)
        .unwrap()
        .is_none());
}

#[test]
fn test_reward_element_targets_clickable_ancestor() {
    let tree = window(vec![UINode::new("android.widget.LinearLayout")
        .clickable()
        .with_bounds(100, 200, 300, 250)
        .with_child(
            UINode::new("android.widget.RelativeLayout")
                .with_bounds(110, 205, 290, 245)
                .with_child(
                    UINode::new("android.widget.TextView")
                        .with_text("领取红包")
                        .with_bounds(120, 210, 200, 240),
                ),
        )]);
    let engine = engine_with(tree);
    let root = root_of(&engine);
    let candidate = NodeSearch::default()
        .find_reward_element(&root, &KEYWORDS)
        .unwrap()
        .expect("candidate");
    assert_eq!(candidate.point, Point::new(200.0, 225.0));

    let expected = crate::ElementIdentity::from_parts(
        "android.widget.TextView",
        Some("领取红包"),
        crate::Rect::new(120, 210, 200, 240),
    );
    assert_eq!(candidate.identity, expected, "identity is the matched node's");

    drop(root);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_reward_element_without_clickable_ancestor() {
    let tree = window(vec![UINode::new("android.widget.TextView")
        .with_text("领取红包")
        .with_bounds(120, 210, 200, 240)]);
    let engine = engine_with(tree);
    let root = root_of(&engine);
    assert!(NodeSearch::default()
        .find_reward_element(&root, &KEYWORDS)
        .unwrap()
        .is_none());
}

fn three_level_chain() -> UINode {
    UINode::new("GrandParent")
        .clickable()
        .with_bounds(0, 0, 100, 100)
        .with_child(
            UINode::new("Parent")
                .with_bounds(10, 10, 90, 90)
                .with_child(UINode::new("Leaf").with_bounds(20, 20, 80, 80)),
        )
}

#[test]
fn test_click_delegates_to_grandparent() {
    let engine = engine_with(three_level_chain());
    let root = root_of(&engine);
    let leaf = root.child(0).unwrap().unwrap().child(0).unwrap().unwrap();
    assert_eq!(leaf.class_name().as_deref(), Some("Leaf"));

    assert!(click_or_delegate_to_parent(&leaf, DEFAULT_MAX_DEPTH));

    let clicks = engine.clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].class_name, "GrandParent");

    drop(leaf);
    drop(root);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_click_without_clickable_ancestor_fails_silently() {
    let tree = UINode::new("Root").with_child(UINode::new("Leaf"));
    let engine = engine_with(tree);
    let root = root_of(&engine);
    let leaf = root.child(0).unwrap().unwrap();

    assert!(!click_or_delegate_to_parent(&leaf, DEFAULT_MAX_DEPTH));
    assert!(engine.clicks().is_empty());
}

#[test]
fn test_click_on_stale_node_fails_silently() {
    let engine = engine_with(three_level_chain());
    let root = root_of(&engine);
    let leaf = root.child(0).unwrap().unwrap().child(0).unwrap().unwrap();

    // Host rebuilt the tree between detection and action
    engine.set_tree(Some(three_level_chain()));
    assert!(!click_or_delegate_to_parent(&leaf, DEFAULT_MAX_DEPTH));
    assert!(engine.clicks().is_empty());
}

fn capped(max_depth: usize) -> NodeSearch {
    NodeSearch::new(SearchConfig {
        max_depth,
        ..SearchConfig::default()
    })
}

#[test]
fn test_keyword_search_depth_cap() {
    // Reward text sits three levels below the window root
    let tree = window(vec![UINode::new("a").with_child(
        UINode::new("b")
            .clickable()
            .with_bounds(100, 200, 300, 250)
            .with_child(UINode::new("android.widget.TextView").with_text("领取红包")),
    )]);
    let engine = engine_with(tree);
    let root = root_of(&engine);

    assert!(capped(2).find_reward_node(&root, &KEYWORDS).unwrap().is_none());
    let hit = capped(3)
        .find_reward_node(&root, &KEYWORDS)
        .unwrap()
        .expect("reachable at depth 3");
    assert_eq!(hit.keyword, "领取红包");

    drop(hit);
    drop(root);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_parent_walk_cap() {
    let engine = engine_with(three_level_chain());
    let root = root_of(&engine);
    let leaf = root.child(0).unwrap().unwrap().child(0).unwrap().unwrap();

    // GrandParent is the second ancestor
    assert_eq!(capped(1).click_target_center(&leaf).unwrap(), None);
    assert_eq!(
        capped(2).click_target_center(&leaf).unwrap(),
        Some(Point::new(50.0, 50.0))
    );

    assert!(!click_or_delegate_to_parent(&leaf, 1));
    assert!(engine.clicks().is_empty());
    assert!(click_or_delegate_to_parent(&leaf, 2));
    assert_eq!(engine.clicks()[0].class_name, "GrandParent");

    drop(leaf);
    drop(root);
    assert_eq!(engine.live_handles(), 0);
}

/// Window root whose first child the host cannot hand out; everything else
/// comes from the snapshot
#[derive(Debug)]
struct UnreadableFirstChild {
    host: SnapshotEngine,
    root: UIElement,
}

fn unreadable_first_child(host: &SnapshotEngine) -> UIElement {
    UIElement::new(Box::new(UnreadableFirstChild {
        host: host.clone(),
        root: root_of(host),
    }))
}

impl UIElementImpl for UnreadableFirstChild {
    fn class_name(&self) -> Option<String> {
        self.root.class_name()
    }

    fn text(&self) -> Option<String> {
        self.root.text()
    }

    fn is_clickable(&self) -> bool {
        self.root.is_clickable()
    }

    fn bounds(&self) -> Result<Rect, AutomationError> {
        self.root.bounds()
    }

    fn child_count(&self) -> usize {
        self.root.child_count()
    }

    fn child(&self, index: usize) -> Result<Option<UIElement>, AutomationError> {
        if index == 0 {
            return Err(AutomationError::StaleElement("child 0 was recycled".into()));
        }
        self.root.child(index)
    }

    fn parent(&self) -> Result<Option<UIElement>, AutomationError> {
        Ok(None)
    }

    fn perform_click(&self) -> Result<bool, AutomationError> {
        self.root.perform_click()
    }

    fn reacquire(&self) -> Result<Option<UIElement>, AutomationError> {
        Ok(Some(unreadable_first_child(&self.host)))
    }
}

/// Host serving the snapshot tree through [`UnreadableFirstChild`]
struct UnreadableFirstChildHost(SnapshotEngine);

impl AccessibilityEngine for UnreadableFirstChildHost {
    fn get_active_root(&self) -> Result<Option<UIElement>, AutomationError> {
        Ok(Some(unreadable_first_child(&self.0)))
    }

    fn display_metrics(&self) -> Result<ScreenGeometry, AutomationError> {
        self.0.display_metrics()
    }

    fn dispatch_gesture(&self, gesture: &GestureDescription) -> Result<(), AutomationError> {
        self.0.dispatch_gesture(gesture)
    }

    fn send_intent(&self, payload: &NotificationPayload) -> Result<(), AutomationError> {
        self.0.send_intent(payload)
    }
}

fn chat_behind_broken_sibling() -> UINode {
    window(vec![
        message("微信红包", 100),
        message("领取红包", 400),
        button_at(500, 1200),
    ])
}

#[test]
fn test_unreadable_child_is_skipped_by_both_searches() {
    init_tracing();
    let engine = engine_with(chat_behind_broken_sibling());
    let root = unreadable_first_child(&engine);
    let search = NodeSearch::default();

    let button = search.find_open_button(&root, SCREEN).unwrap();
    assert_eq!(button.map(|c| c.point), Some(Point::new(500.0, 1200.0)));

    // The second keyword only appeared under the unreadable child
    let hit = search
        .find_reward_node(&root, &KEYWORDS)
        .unwrap()
        .expect("readable siblings still searched");
    assert_eq!(hit.keyword, "领取红包");
    assert_eq!(hit.node.bounds().unwrap(), Rect::new(120, 410, 680, 450));

    let candidate = search
        .find_reward_element(&root, &["微信红包"])
        .unwrap();
    assert!(candidate.is_none());

    drop(hit);
    drop(root);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_engine_taps_past_unreadable_child() {
    let snapshot = engine_with(window(vec![message("hello", 100), message("领取红包", 400)]));
    let scheduler = Arc::new(ManualScheduler::new());
    let mut engine = AutomationEngine::new(
        EngineConfig::default(),
        Arc::new(UnreadableFirstChildHost(snapshot.clone())),
        scheduler.clone(),
    )
    .unwrap()
    .with_seed(7);

    let event = crate::AccessibilityEvent::new(
        "com.tencent.mm",
        crate::EventType::WindowContentChanged,
        1_000,
    );
    match engine.on_event(&event) {
        EventOutcome::TapScheduled { source, point, .. } => {
            assert_eq!(source, MatchSource::Keyword);
            assert!(Rect::new(100, 400, 700, 500).contains(point));
        }
        other => panic!("expected a tap past the unreadable child, got {other:?}"),
    }
    assert_eq!(scheduler.run_all(), 1);
    assert_eq!(snapshot.gestures().len(), 1);
    assert_eq!(snapshot.live_handles(), 0);
}
