//! Reorientation of actors toward their effective up.
//!
//! A transition start sets the blend target and tells the gravity world how
//! long the turn should take. Each fixed step turns the actor by at most
//! `rate * dt`; reaching the target completes the transition. If the
//! fail-safe fires first, the actor snaps instead.

use avian3d::prelude::*;
use bevy::prelude::*;
use gravity_core::{AlignCommand, orient};

use super::{GravityMessage, GravitySimulation};

/// Default turn rate in radians per second.
pub const DEFAULT_BLEND_RATE: f32 = 4.0;

/// Per-tick rotation of an actor's up-axis toward a target up.
#[derive(Component, Clone, Debug)]
pub struct OrientationBlend {
    /// Turn rate in radians per second.
    pub rate: f32,
    target_up: Option<Vec3>,
}

impl Default for OrientationBlend {
    fn default() -> Self {
        Self::new(DEFAULT_BLEND_RATE)
    }
}

impl OrientationBlend {
    pub fn new(rate: f32) -> Self {
        Self {
            rate,
            target_up: None,
        }
    }

    /// Seconds this blend needs to turn `rotation`'s up onto `target_up`.
    pub fn duration(&self, rotation: Quat, target_up: Vec3) -> f32 {
        let angle = (rotation * Vec3::Y).angle_between(target_up);
        angle / self.rate.max(f32::EPSILON)
    }
}

/// Begin blending actors whose transition just started.
pub(super) fn start_blends(
    mut messages: MessageReader<GravityMessage>,
    mut sim: ResMut<GravitySimulation>,
    mut query: Query<(&Rotation, &mut OrientationBlend)>,
) {
    for message in messages.read() {
        let GravityMessage::TransitionStarted { actor, .. } = *message else {
            continue;
        };
        let Ok((rotation, mut blend)) = query.get_mut(actor) else {
            continue;
        };
        let Some(body) = sim.body_of(actor) else {
            continue;
        };
        let Some(AlignCommand::Smooth { target_up }) =
            sim.world().force_align(body, rotation.0, false)
        else {
            continue;
        };

        let duration = blend.duration(rotation.0, target_up);
        sim.world_mut().mark_transition(body, duration);
        blend.target_up = Some(target_up);
    }
}

/// Snap actors whose transition ran out of time.
pub(super) fn snap_timed_out(
    mut messages: MessageReader<GravityMessage>,
    sim: Res<GravitySimulation>,
    mut query: Query<(&mut Rotation, Option<&mut OrientationBlend>)>,
) {
    for message in messages.read() {
        let GravityMessage::TransitionTimedOut { actor, .. } = *message else {
            continue;
        };
        let Ok((mut rotation, blend)) = query.get_mut(actor) else {
            continue;
        };
        let Some(body) = sim.body_of(actor) else {
            continue;
        };
        if let Some(AlignCommand::Snap { rotation: snapped }) =
            sim.world().force_align(body, rotation.0, true)
        {
            rotation.0 = snapped;
        }
        if let Some(mut blend) = blend {
            blend.target_up = None;
        }
    }
}

/// Turn blending actors and report completion once aligned.
pub(super) fn advance_blends(
    time: Res<Time>,
    mut sim: ResMut<GravitySimulation>,
    mut query: Query<(Entity, &mut Rotation, &mut OrientationBlend)>,
) {
    let dt = time.delta_secs();

    for (entity, mut rotation, mut blend) in &mut query {
        let Some(target_up) = blend.target_up else {
            continue;
        };
        let (turned, reached) = orient::rotate_up_towards(rotation.0, target_up, blend.rate * dt);
        rotation.0 = turned;
        if !reached {
            continue;
        }

        blend.target_up = None;
        if let Some(body) = sim.body_of(entity)
            && sim.world_mut().complete_transition(body, target_up).is_some()
        {
            tracing::debug!("{entity} finished reorienting to {target_up}");
        }
    }
}
