use crate::config::DEFAULT_COOLDOWN_MS;
use crate::types::ElementIdentity;
use tracing::trace;

/// Last element acted upon and when
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateGuardState {
    pub last_identity: Option<ElementIdentity>,
    pub last_action_ms: u64,
}

/// Suppresses repeated actions on the same element within a cooldown window.
///
/// The decision has to be latched with [`DuplicateGuard::record`] at detection
/// time; a tap fires hundreds of milliseconds later and the next window event
/// for the same element may arrive before it does.
#[derive(Debug, Clone)]
pub struct DuplicateGuard {
    state: DuplicateGuardState,
    cooldown_ms: u64,
}

impl Default for DuplicateGuard {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_MS)
    }
}

impl DuplicateGuard {
    pub fn new(cooldown_ms: u64) -> Self {
        Self::with_state(DuplicateGuardState::default(), cooldown_ms)
    }

    pub fn with_state(state: DuplicateGuardState, cooldown_ms: u64) -> Self {
        Self { state, cooldown_ms }
    }

    pub fn state(&self) -> DuplicateGuardState {
        self.state
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }

    /// True when `identity` differs from the last recorded element, or the
    /// cooldown since the last action on it has strictly elapsed.
    pub fn should_act(&self, identity: ElementIdentity, now_ms: u64) -> bool {
        match self.state.last_identity {
            Some(last) if last == identity => {
                now_ms.saturating_sub(self.state.last_action_ms) > self.cooldown_ms
            }
            _ => true,
        }
    }

    pub fn record(&mut self, identity: ElementIdentity, now_ms: u64) {
        trace!(%identity, now_ms, "recording action");
        self.state = DuplicateGuardState {
            last_identity: Some(identity),
            last_action_ms: now_ms,
        };
    }

    /// `should_act` followed by `record` when it allows the action
    pub fn check_and_record(&mut self, identity: ElementIdentity, now_ms: u64) -> bool {
        if self.should_act(identity, now_ms) {
            self.record(identity, now_ms);
            true
        } else {
            false
        }
    }
}
