//! Debounce gate between trigger events and membership commits.
//!
//! Every (area, body) pair has at most one pending action. An event opposite
//! to the pending one cancels it instead of queueing, so a body flapping
//! across a boundary faster than the area's delay never changes membership.

use crate::{area::AreaId, body::BodyId};

/// Slack for comparing accumulated tick time against a delay.
const TIME_EPSILON: f64 = 1e-9;

/// Membership change waiting for its delay to elapse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingAction {
    Enter,
    Exit,
}

impl PendingAction {
    fn opposite(self) -> Self {
        match self {
            PendingAction::Enter => PendingAction::Exit,
            PendingAction::Exit => PendingAction::Enter,
        }
    }
}

/// A recorded trigger event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HysteresisEntry {
    pub area: AreaId,
    pub body: BodyId,
    pub action: PendingAction,
    /// Simulation time the event was recorded, in seconds.
    pub recorded_at: f64,
}

/// What a trigger event did to the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    /// A pending action was recorded (or refreshed).
    Recorded,
    /// The opposite pending action was canceled.
    Canceled,
}

/// Pending membership changes, kept in the order they were recorded.
#[derive(Clone, Debug, Default)]
pub struct HysteresisGate {
    entries: Vec<HysteresisEntry>,
}

impl HysteresisGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A body's volume started overlapping the area.
    pub fn on_enter(&mut self, area: AreaId, body: BodyId, now: f64) -> GateOutcome {
        self.record(area, body, PendingAction::Enter, now)
    }

    /// A body's volume stopped overlapping the area.
    pub fn on_exit(&mut self, area: AreaId, body: BodyId, now: f64) -> GateOutcome {
        self.record(area, body, PendingAction::Exit, now)
    }

    fn record(
        &mut self,
        area: AreaId,
        body: BodyId,
        action: PendingAction,
        now: f64,
    ) -> GateOutcome {
        if let Some(index) = self.position(area, body) {
            let existing = self.entries.remove(index);
            if existing.action == action.opposite() {
                return GateOutcome::Canceled;
            }
        }

        self.entries.push(HysteresisEntry {
            area,
            body,
            action,
            recorded_at: now,
        });
        GateOutcome::Recorded
    }

    fn position(&self, area: AreaId, body: BodyId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.area == area && entry.body == body)
    }

    /// Pending action for a pair, if any.
    pub fn pending(&self, area: AreaId, body: BodyId) -> Option<PendingAction> {
        self.position(area, body).map(|index| self.entries[index].action)
    }

    /// Remove and return every entry whose delay has elapsed, in recording order.
    ///
    /// `delay_of` maps an area to its delay; entries for areas it does not
    /// know are dropped without being returned.
    pub fn sweep(
        &mut self,
        now: f64,
        mut delay_of: impl FnMut(AreaId) -> Option<f32>,
    ) -> Vec<HysteresisEntry> {
        let mut ready = Vec::new();
        self.entries.retain(|entry| match delay_of(entry.area) {
            Some(delay) => {
                if now - entry.recorded_at + TIME_EPSILON >= f64::from(delay) {
                    ready.push(*entry);
                    false
                } else {
                    true
                }
            }
            None => false,
        });
        ready
    }

    /// Drop every pending action for a body.
    pub fn purge_body(&mut self, body: BodyId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.body != body);
        before - self.entries.len()
    }

    /// Drop every pending action for an area.
    pub fn purge_area(&mut self, area: AreaId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.area != area);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
