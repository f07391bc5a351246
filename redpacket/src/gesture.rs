//! Deferred tap gestures
//!
//! A tap is never injected synchronously: the dispatcher draws a random delay
//! and hands a one-shot task to a [`Scheduler`] that runs it on the same
//! execution context the host delivers events on.

use crate::errors::AutomationError;
use crate::platforms::AccessibilityEngine;
use crate::types::Point;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Press-and-release duration of a synthesized tap
pub const TAP_DURATION: Duration = Duration::from_millis(50);

/// One continuous touch: the pointer follows `path` starting at `start_time` for `duration`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeDescription {
    pub path: Vec<Point>,
    pub start_time: Duration,
    pub duration: Duration,
}

/// A gesture as handed to the host's input injection surface
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GestureDescription {
    pub strokes: Vec<StrokeDescription>,
}

impl GestureDescription {
    /// Single-point tap at `point`
    pub fn tap(point: Point, duration: Duration) -> Self {
        Self {
            strokes: vec![StrokeDescription {
                path: vec![point],
                start_time: Duration::ZERO,
                duration,
            }],
        }
    }

    /// First point of the first stroke, if any
    pub fn origin(&self) -> Option<Point> {
        self.strokes.first().and_then(|s| s.path.first().copied())
    }
}

/// Bounds of the random delay before a tap, in milliseconds (both inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapDelay {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for TapDelay {
    fn default() -> Self {
        Self {
            min_ms: 500,
            max_ms: 1200,
        }
    }
}

impl TapDelay {
    pub fn new(min_ms: u64, max_ms: u64) -> Result<Self, AutomationError> {
        let delay = Self { min_ms, max_ms };
        delay.validate()?;
        Ok(delay)
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.min_ms > self.max_ms {
            return Err(AutomationError::InvalidArgument(format!(
                "tap delay min ({} ms) is greater than max ({} ms)",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }

    /// Draw a delay uniformly from `[min_ms, max_ms]`
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

/// Work deferred onto the host's dispatch context
pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs one-shot tasks after a delay on the event-delivery context.
///
/// Implementations must not run `task` synchronously inside `schedule`.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: DeferredTask);
}

/// Scheduler backed by a tokio runtime.
///
/// Hosts that deliver events from a current-thread runtime get the
/// single-threaded behaviour the engine expects.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime the caller is running on
    pub fn current() -> Result<Self, AutomationError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| AutomationError::PlatformError(format!("No tokio runtime: {e}")))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: DeferredTask) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

struct PendingTask {
    due: Duration,
    seq: u64,
    task: DeferredTask,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTask>,
}

/// Scheduler driven by an explicit virtual clock.
///
/// Nothing runs until the owner calls [`ManualScheduler::advance`]; tasks then
/// run in due order (scheduling order on ties). Suited to hosts that pump
/// their own looper, and to tests.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn now(&self) -> Duration {
        self.lock().now
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Due time of the earliest pending task
    pub fn next_due(&self) -> Option<Duration> {
        self.lock().pending.iter().map(|p| p.due).min()
    }

    /// Move the clock forward by `by`, running every task that comes due.
    /// Returns how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now + by;
        let mut ran = 0;
        loop {
            // Take the task out before running it so it may schedule more work
            let next = {
                let mut state = self.lock();
                let position = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(i, _)| i);
                match position {
                    Some(i) => {
                        let task = state.pending.remove(i);
                        state.now = task.due;
                        Some(task)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };
            match next {
                Some(pending) => {
                    (pending.task)();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Run everything currently pending, however far out
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while let Some(due) = self.next_due() {
            let now = self.now();
            ran += self.advance(due.saturating_sub(now));
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: DeferredTask) {
        let mut state = self.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(PendingTask { due, seq, task });
    }
}

/// Schedules delayed single-point taps on the host
pub struct GestureDispatcher {
    host: Arc<dyn AccessibilityEngine>,
    scheduler: Arc<dyn Scheduler>,
    delay: TapDelay,
    tap_duration: Duration,
    rng: StdRng,
}

impl GestureDispatcher {
    pub fn new(
        host: Arc<dyn AccessibilityEngine>,
        scheduler: Arc<dyn Scheduler>,
        delay: TapDelay,
    ) -> Self {
        Self {
            host,
            scheduler,
            delay,
            tap_duration: TAP_DURATION,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the entropy-seeded generator with a deterministic one
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_tap_duration(mut self, tap_duration: Duration) -> Self {
        self.tap_duration = tap_duration;
        self
    }

    pub fn delay(&self) -> TapDelay {
        self.delay
    }

    /// Schedule a tap at `point` after a random delay and return immediately.
    ///
    /// Fire-and-forget: an injection failure is logged when the task runs and
    /// is not retried. Returns the delay that was drawn.
    #[instrument(level = "debug", skip(self))]
    pub fn tap(&mut self, point: Point) -> Duration {
        let delay = self.delay.draw(&mut self.rng);
        debug!(delay_ms = delay.as_millis() as u64, "random tap delay");

        let host = self.host.clone();
        let gesture = GestureDescription::tap(point, self.tap_duration);
        self.scheduler.schedule(
            delay,
            Box::new(move || match host.dispatch_gesture(&gesture) {
                Ok(()) => info!(x = point.x, y = point.y, "tap dispatched"),
                Err(e) => warn!(x = point.x, y = point.y, "tap dispatch failed: {}", e),
            }),
        );
        delay
    }
}
