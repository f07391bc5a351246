//! The orchestrator: one `on_event` call per host event.
//!
//! Events are handled sequentially on the host's dispatch context, so the
//! engine takes `&mut self` and holds its duplicate guard without locks.
//! Nothing in here propagates an error to the host; every failure degrades to
//! "no action for this event".

use crate::classifier::{Action, EventClassifier};
use crate::config::{ClickStrategy, EngineConfig};
use crate::errors::AutomationError;
use crate::events::AccessibilityEvent;
use crate::gesture::{GestureDispatcher, Scheduler};
use crate::guard::DuplicateGuard;
use crate::platforms::AccessibilityEngine;
use crate::search::{click_or_delegate_to_parent, NodeSearch};
use crate::types::{ElementIdentity, Point};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Which search produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    OpenButton,
    Keyword,
}

/// What the engine did with one event
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Wrong package or an event type nobody handles
    Ignored,
    /// Notification scanned: fragments carrying the marker, intents fired
    Notification { matched: usize, opened: usize },
    /// A host resource (window root, display metrics) was not available
    Unavailable,
    TapScheduled {
        source: MatchSource,
        identity: ElementIdentity,
        point: Point,
        delay: Duration,
    },
    Clicked {
        identity: ElementIdentity,
        accepted: bool,
    },
    Suppressed {
        source: MatchSource,
        identity: ElementIdentity,
    },
    NoMatch,
    /// The host failed mid-pass; the next event starts over
    Failed,
}

/// Running counters since the service connected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub events: u64,
    pub ignored: u64,
    pub notifications_opened: u64,
    pub intent_failures: u64,
    pub taps_scheduled: u64,
    pub clicks: u64,
    pub duplicates_suppressed: u64,
    pub misses: u64,
}

pub struct AutomationEngine {
    config: EngineConfig,
    host: Arc<dyn AccessibilityEngine>,
    classifier: EventClassifier,
    search: NodeSearch,
    guard: DuplicateGuard,
    dispatcher: GestureDispatcher,
    stats: EngineStats,
}

impl AutomationEngine {
    pub fn new(
        config: EngineConfig,
        host: Arc<dyn AccessibilityEngine>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, AutomationError> {
        config.validate()?;
        let dispatcher = GestureDispatcher::new(host.clone(), scheduler, config.tap_delay)
            .with_tap_duration(Duration::from_millis(config.tap_duration_ms));
        Ok(Self {
            classifier: EventClassifier::new(config.target_package.clone()),
            search: NodeSearch::new(config.search.clone()),
            guard: DuplicateGuard::new(config.cooldown_ms),
            dispatcher,
            host,
            config,
            stats: EngineStats::default(),
        })
    }

    /// Seed the tap-delay generator for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.dispatcher = self.dispatcher.with_seed(seed);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn guard(&self) -> &DuplicateGuard {
        &self.guard
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn on_service_connected(&self) {
        info!(
            target_package = %self.config.target_package,
            "red packet accessibility service connected"
        );
    }

    pub fn on_interrupt(&self) {
        info!(stats = ?self.stats, "accessibility service interrupted");
    }

    #[instrument(level = "debug", skip(self, event), fields(event_type = %event.event_type))]
    pub fn on_event(&mut self, event: &AccessibilityEvent) -> EventOutcome {
        self.stats.events += 1;
        let outcome = match self.classifier.classify(event) {
            Action::HandleNotification => self.handle_notification(event),
            Action::HandleWindowChange => self.handle_window_changed(event.event_time_ms),
            Action::Ignore => EventOutcome::Ignored,
        };

        match &outcome {
            EventOutcome::Ignored => self.stats.ignored += 1,
            EventOutcome::Unavailable | EventOutcome::Failed => self.stats.misses += 1,
            EventOutcome::Suppressed { .. } => self.stats.duplicates_suppressed += 1,
            EventOutcome::TapScheduled { .. } => self.stats.taps_scheduled += 1,
            EventOutcome::Clicked { .. } => self.stats.clicks += 1,
            _ => {}
        }
        outcome
    }

    /// Fire the notification's open action for every fragment carrying the marker
    fn handle_notification(&mut self, event: &AccessibilityEvent) -> EventOutcome {
        let mut matched = 0;
        let mut opened = 0;
        for fragment in &event.text {
            if !fragment.contains(self.config.notification_marker.as_str()) {
                continue;
            }
            matched += 1;
            debug!(text = %fragment, "reward notification detected");

            let Some(payload) = event.payload.as_ref() else {
                debug!("notification carries no open action");
                continue;
            };
            match self.host.send_intent(payload) {
                Ok(()) => {
                    opened += 1;
                    self.stats.notifications_opened += 1;
                    info!(intent = %payload.intent_id, "notification opened");
                }
                Err(e) => {
                    self.stats.intent_failures += 1;
                    warn!(intent = %payload.intent_id, "failed to open notification: {}", e);
                }
            }
        }
        EventOutcome::Notification { matched, opened }
    }

    /// Popup button first, chat keywords second
    fn handle_window_changed(&mut self, now_ms: u64) -> EventOutcome {
        let root = match self.host.get_active_root() {
            Ok(Some(root)) => root,
            Ok(None) => {
                warn!("no root node for the active window");
                return EventOutcome::Unavailable;
            }
            Err(e) => {
                warn!("failed to read the active window: {}", e);
                return EventOutcome::Unavailable;
            }
        };
        trace!(root_class = ?root.class_name(), "active window root");

        let screen = match self.host.display_metrics() {
            Ok(screen) => screen,
            Err(e) => {
                warn!("display metrics unavailable: {}", e);
                return EventOutcome::Unavailable;
            }
        };

        match self.search.find_open_button(&root, screen) {
            Ok(Some(candidate)) => {
                if !self.guard.check_and_record(candidate.identity, now_ms) {
                    debug!(identity = %candidate.identity, "open button already handled");
                    return EventOutcome::Suppressed {
                        source: MatchSource::OpenButton,
                        identity: candidate.identity,
                    };
                }
                let delay = self.dispatcher.tap(candidate.point);
                return EventOutcome::TapScheduled {
                    source: MatchSource::OpenButton,
                    identity: candidate.identity,
                    point: candidate.point,
                    delay,
                };
            }
            Ok(None) => {}
            Err(e) => {
                warn!("open button search failed: {}", e);
                return EventOutcome::Failed;
            }
        }

        let result = match self.config.click_strategy {
            ClickStrategy::Gesture => self.tap_reward(&root, now_ms),
            ClickStrategy::Action => self.click_reward(&root, now_ms),
        };
        result.unwrap_or_else(|e| {
            warn!("reward search failed: {}", e);
            EventOutcome::Failed
        })
    }

    fn tap_reward(
        &mut self,
        root: &crate::UIElement,
        now_ms: u64,
    ) -> Result<EventOutcome, AutomationError> {
        let Some(candidate) = self
            .search
            .find_reward_element(root, &self.config.keywords)?
        else {
            return Ok(EventOutcome::NoMatch);
        };
        if !self.guard.check_and_record(candidate.identity, now_ms) {
            return Ok(EventOutcome::Suppressed {
                source: MatchSource::Keyword,
                identity: candidate.identity,
            });
        }
        info!(identity = %candidate.identity, "new red packet found, tapping");
        let delay = self.dispatcher.tap(candidate.point);
        Ok(EventOutcome::TapScheduled {
            source: MatchSource::Keyword,
            identity: candidate.identity,
            point: candidate.point,
            delay,
        })
    }

    fn click_reward(
        &mut self,
        root: &crate::UIElement,
        now_ms: u64,
    ) -> Result<EventOutcome, AutomationError> {
        let Some(hit) = self.search.find_reward_node(root, &self.config.keywords)? else {
            return Ok(EventOutcome::NoMatch);
        };
        let identity = hit.node.identity()?;
        if !self.guard.check_and_record(identity, now_ms) {
            return Ok(EventOutcome::Suppressed {
                source: MatchSource::Keyword,
                identity,
            });
        }
        info!(%identity, keyword = %hit.keyword, "new red packet found, clicking");
        let accepted = click_or_delegate_to_parent(&hit.node, self.config.search.max_depth);
        Ok(EventOutcome::Clicked { identity, accepted })
    }
}
