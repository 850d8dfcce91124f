//! The gravity simulation context.
//!
//! [`GravityWorld`] owns every area and body of a level together with the
//! hysteresis gate and the simulation clock. The host feeds it trigger events
//! as they happen and calls [`GravityWorld::tick`] once per fixed step; the
//! tick commits ready membership changes, recomputes each touched body once,
//! and runs the transition fail-safe. Notifications for adapters queue up
//! until [`GravityWorld::drain_events`] is called.

use std::collections::BTreeMap;

use glam::{Quat, Vec3};

use crate::{
    area::{AreaId, GravityArea},
    body::{AlignCommand, BodyId, GravityBody, Transition},
    config::GravityConfig,
    hysteresis::{GateOutcome, HysteresisGate, PendingAction},
};

/// Notification produced by the gravity world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GravityEvent {
    /// A pending enter committed; the area joined the body's active set.
    AreaEntered { body: BodyId, area: AreaId },
    /// A pending exit committed; the area left the body's active set.
    AreaExited { body: BodyId, area: AreaId },
    /// The effective up changed materially; consumers should start reorienting.
    TransitionStarted {
        body: BodyId,
        old_up: Vec3,
        new_up: Vec3,
    },
    /// A consumer reported that its reorientation finished.
    TransitionCompleted {
        body: BodyId,
        old_up: Vec3,
        new_up: Vec3,
    },
    /// No completion arrived before the fail-safe deadline.
    TransitionTimedOut {
        body: BodyId,
        old_up: Vec3,
        new_up: Vec3,
    },
}

/// Areas, bodies and pending membership changes of one level.
#[derive(Debug, Default)]
pub struct GravityWorld {
    config: GravityConfig,
    areas: BTreeMap<AreaId, GravityArea>,
    bodies: BTreeMap<BodyId, GravityBody>,
    gate: HysteresisGate,
    events: Vec<GravityEvent>,
    next_area: u32,
    next_body: u32,
    now: f64,
}

impl GravityWorld {
    pub fn new(config: GravityConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &GravityConfig {
        &self.config
    }

    /// Current simulation time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    // ------------------------------------------------------------------------
    // Areas
    // ------------------------------------------------------------------------

    /// Register a validated area.
    pub fn add_area(&mut self, area: GravityArea) -> AreaId {
        let id = AreaId(self.next_area);
        self.next_area += 1;
        tracing::debug!(
            "Registered gravity area {id:?} (priority {}, delay {}s)",
            area.priority(),
            area.hysteresis_delay()
        );
        self.areas.insert(id, area);
        id
    }

    /// Remove an area, its pending actions, and its membership in every body.
    ///
    /// Affected bodies are recomputed on the next tick.
    pub fn remove_area(&mut self, id: AreaId) -> Option<GravityArea> {
        let area = self.areas.remove(&id)?;
        self.gate.purge_area(id);
        for body in self.bodies.values_mut() {
            body.remove_area(id);
        }
        Some(area)
    }

    /// Remove every area, as on level teardown. Bodies survive with empty sets.
    pub fn clear_areas(&mut self) {
        let ids: Vec<_> = self.areas.keys().copied().collect();
        for id in ids {
            self.remove_area(id);
        }
        self.gate.clear();
    }

    pub fn area(&self, id: AreaId) -> Option<&GravityArea> {
        self.areas.get(&id)
    }

    pub fn areas(&self) -> impl Iterator<Item = (AreaId, &GravityArea)> {
        self.areas.iter().map(|(id, area)| (*id, area))
    }

    // ------------------------------------------------------------------------
    // Bodies
    // ------------------------------------------------------------------------

    /// Create a body outside every area.
    pub fn spawn_body(&mut self) -> BodyId {
        let id = BodyId(self.next_body);
        self.next_body += 1;
        self.bodies.insert(id, GravityBody::new(&self.config));
        id
    }

    /// Destroy a body and purge any pending actions that reference it.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        let purged = self.gate.purge_body(id);
        let removed = self.bodies.remove(&id).is_some();
        if removed {
            tracing::debug!("Removed gravity body {id:?}, purged {purged} pending actions");
        }
        removed
    }

    pub fn body(&self, id: BodyId) -> Option<&GravityBody> {
        self.bodies.get(&id)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &GravityBody)> {
        self.bodies.iter().map(|(id, body)| (*id, body))
    }

    // ------------------------------------------------------------------------
    // Trigger input
    // ------------------------------------------------------------------------

    /// A body's collision volume entered an area's trigger volume.
    ///
    /// Returns `false` if either handle is unknown.
    pub fn on_volume_enter(&mut self, area: AreaId, body: BodyId) -> bool {
        self.record(area, body, PendingAction::Enter)
    }

    /// A body's collision volume left an area's trigger volume.
    pub fn on_volume_exit(&mut self, area: AreaId, body: BodyId) -> bool {
        self.record(area, body, PendingAction::Exit)
    }

    fn record(&mut self, area: AreaId, body: BodyId, action: PendingAction) -> bool {
        if !self.areas.contains_key(&area) || !self.bodies.contains_key(&body) {
            return false;
        }
        let outcome = match action {
            PendingAction::Enter => self.gate.on_enter(area, body, self.now),
            PendingAction::Exit => self.gate.on_exit(area, body, self.now),
        };
        if outcome == GateOutcome::Canceled {
            tracing::trace!("{action:?} of {body:?} in {area:?} canceled a pending change");
        }
        true
    }

    /// Pending action for an (area, body) pair, if any.
    pub fn pending(&self, area: AreaId, body: BodyId) -> Option<PendingAction> {
        self.gate.pending(area, body)
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Advance the clock by `dt` seconds and process everything that is due.
    pub fn tick(&mut self, dt: f64) {
        if dt.is_finite() && dt > 0.0 {
            self.now += dt;
        }

        // Commit all memberships first.
        let areas = &self.areas;
        let ready = self
            .gate
            .sweep(self.now, |id| areas.get(&id).map(GravityArea::hysteresis_delay));
        for entry in ready {
            let (Some(area), Some(body)) =
                (self.areas.get(&entry.area), self.bodies.get_mut(&entry.body))
            else {
                continue;
            };
            match entry.action {
                PendingAction::Enter => {
                    if body.add_area(entry.area, area) {
                        tracing::debug!("{:?} entered {:?}", entry.body, entry.area);
                        self.events.push(GravityEvent::AreaEntered {
                            body: entry.body,
                            area: entry.area,
                        });
                    }
                }
                PendingAction::Exit => {
                    if body.remove_area(entry.area) {
                        tracing::debug!("{:?} exited {:?}", entry.body, entry.area);
                        self.events.push(GravityEvent::AreaExited {
                            body: entry.body,
                            area: entry.area,
                        });
                    }
                }
            }
        }

        // Then recompute each touched body once.
        for (id, body) in &mut self.bodies {
            if !body.is_dirty() {
                continue;
            }
            if let Some(transition) = body.recompute_effective(self.now, &self.config) {
                tracing::debug!(
                    "{id:?} gravity transition {} -> {}",
                    transition.old_up,
                    transition.new_up
                );
                self.events.push(GravityEvent::TransitionStarted {
                    body: *id,
                    old_up: transition.old_up,
                    new_up: transition.new_up,
                });
            }
        }

        // Finally the fail-safe.
        for (id, body) in &mut self.bodies {
            if let Some(transition) = body.expire_transition(self.now) {
                tracing::warn!(
                    "{id:?} gravity transition was not completed within {:.2}s, unlocking",
                    transition.deadline - transition.started_at
                );
                self.events.push(GravityEvent::TransitionTimedOut {
                    body: *id,
                    old_up: transition.old_up,
                    new_up: transition.new_up,
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // Queries and consumer callbacks
    // ------------------------------------------------------------------------

    /// Unit gravity direction currently governing a body.
    pub fn effective_gravity_direction(&self, body: BodyId) -> Option<Vec3> {
        self.bodies.get(&body).map(GravityBody::effective_down)
    }

    /// Unit up vector of a body.
    pub fn effective_up(&self, body: BodyId) -> Option<Vec3> {
        self.bodies.get(&body).map(GravityBody::effective_up)
    }

    pub fn is_in_transition(&self, body: BodyId) -> bool {
        self.bodies
            .get(&body)
            .is_some_and(GravityBody::is_in_transition)
    }

    /// Reorient a body toward its effective up. See [`GravityBody::force_align`].
    pub fn force_align(&self, body: BodyId, rotation: Quat, immediate: bool) -> Option<AlignCommand> {
        self.bodies
            .get(&body)
            .map(|body| body.force_align(rotation, immediate))
    }

    /// Called by a consumer once its reorientation animation has reached
    /// `reached_up`. Ignored unless that is the target of the running
    /// transition.
    pub fn complete_transition(&mut self, body: BodyId, reached_up: Vec3) -> Option<Transition> {
        let transition = self
            .bodies
            .get_mut(&body)?
            .complete_transition(reached_up, &self.config)?;
        self.events.push(GravityEvent::TransitionCompleted {
            body,
            old_up: transition.old_up,
            new_up: transition.new_up,
        });
        Some(transition)
    }

    /// Advisory animation duration used to size the fail-safe of the running
    /// transition. Returns `false` for unknown bodies or bodies not in transition.
    pub fn mark_transition(&mut self, body: BodyId, duration_hint: f32) -> bool {
        self.bodies
            .get_mut(&body)
            .is_some_and(|state| state.mark_transition(duration_hint, &self.config))
    }

    /// Take all queued notifications.
    pub fn drain_events(&mut self) -> Vec<GravityEvent> {
        std::mem::take(&mut self.events)
    }
}
