//! Physics integration using Avian 3D.
//!
//! Gravity zones are static sensor colliders. Their collision start/end
//! messages are routed into a [`GravityWorld`] that is ticked once per fixed
//! step; the resulting gravity changes come back out as [`GravityMessage`]s.
//!
//! Avian's global gravity is disabled. Actors receive the acceleration of their
//! own effective gravity direction instead, unless they integrate it
//! themselves (see [`ManualGravity`]).

pub mod orientation;

use std::collections::HashMap;

use avian3d::prelude::*;
use bevy::prelude::*;
use gravity_core::{AreaId, BodyId, GravityEvent, GravityWorld};

pub use orientation::OrientationBlend;

/// Gravitational acceleration in m/s².
pub const GRAVITY: f32 = 9.81;

/// Actors marked with [`DespawnOutOfBounds`] are removed beyond this distance
/// from the origin.
pub const BOUNDS_RADIUS: f32 = 400.0;

/// Collision layers for the sandbox.
///
/// Zones only report overlaps with actors, and ground probes only hit solids.
#[derive(PhysicsLayer, Clone, Copy, Debug, Default)]
pub enum GameLayer {
    /// Static level geometry.
    #[default]
    Ground,
    /// Gravity zone sensors.
    Zone,
    /// Dynamic bodies governed by gravity zones.
    Actor,
}

impl GameLayer {
    pub fn ground() -> CollisionLayers {
        CollisionLayers::new(GameLayer::Ground, [GameLayer::Actor])
    }

    pub fn zone() -> CollisionLayers {
        CollisionLayers::new(GameLayer::Zone, [GameLayer::Actor])
    }

    pub fn actor() -> CollisionLayers {
        CollisionLayers::new(
            GameLayer::Actor,
            [GameLayer::Ground, GameLayer::Zone, GameLayer::Actor],
        )
    }
}

/// System sets of the gravity pipeline, in execution order within `FixedUpdate`.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GravitySystems {
    /// Register new zones and actors, release removed ones.
    Sync,
    /// Route sensor overlaps, tick the world and publish its messages.
    Step,
    /// Apply gravity and reorient actors.
    Apply,
}

/// Plugin wiring the gravity world into Avian.
pub struct GravityPlugin;

impl Plugin for GravityPlugin {
    fn build(&self, app: &mut App) {
        // Disable default gravity - each actor falls along its own effective down.
        app.add_plugins(PhysicsPlugins::default())
            .insert_resource(Gravity(Vec3::ZERO))
            .init_resource::<GravitySimulation>()
            .add_message::<GravityMessage>()
            .configure_sets(
                FixedUpdate,
                (
                    GravitySystems::Sync,
                    GravitySystems::Step,
                    GravitySystems::Apply,
                )
                    .chain(),
            )
            .add_systems(
                FixedUpdate,
                (
                    (release_removed, register_zones, register_actors)
                        .chain()
                        .in_set(GravitySystems::Sync),
                    (route_collisions, step_world)
                        .chain()
                        .in_set(GravitySystems::Step),
                    (
                        apply_zone_gravity,
                        orientation::start_blends,
                        orientation::snap_timed_out,
                        orientation::advance_blends,
                        despawn_out_of_bounds,
                        log_gravity_messages,
                    )
                        .chain()
                        .in_set(GravitySystems::Apply),
                ),
            );
    }
}

// ============================================================================
// Components and messages
// ============================================================================

/// Sensor entity backed by a gravity area.
#[derive(Component, Clone, Copy, Debug)]
pub struct GravityZone {
    pub area: AreaId,
}

/// Entity that owns a gravity body. The body is created on the next fixed step.
#[derive(Component, Default)]
pub struct GravityActor;

/// Actor that applies its own gravity acceleration (e.g. a character controller).
#[derive(Component, Default)]
pub struct ManualGravity;

/// Marker for actors that are despawned when they fall out of the level.
#[derive(Component)]
pub struct DespawnOutOfBounds;

/// Gravity notifications, translated to entities.
#[derive(Message, Clone, Copy, Debug)]
pub enum GravityMessage {
    /// An actor's membership in a zone was committed.
    ZoneEntered { actor: Entity, zone: Entity },
    /// An actor left a zone.
    ZoneExited { actor: Entity, zone: Entity },
    /// The actor's up changed; consumers should start reorienting.
    TransitionStarted {
        actor: Entity,
        old_up: Vec3,
        new_up: Vec3,
    },
    /// The actor's reorientation finished.
    TransitionCompleted { actor: Entity, new_up: Vec3 },
    /// Nobody completed the transition in time; the actor should snap.
    TransitionTimedOut { actor: Entity, new_up: Vec3 },
}

// ============================================================================
// Simulation resource
// ============================================================================

/// The gravity world plus the mapping between its handles and entities.
#[derive(Resource, Default)]
pub struct GravitySimulation {
    world: GravityWorld,
    zones: HashMap<Entity, AreaId>,
    zone_entities: HashMap<AreaId, Entity>,
    actors: HashMap<Entity, BodyId>,
    actor_entities: HashMap<BodyId, Entity>,
}

impl GravitySimulation {
    pub fn world(&self) -> &GravityWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut GravityWorld {
        &mut self.world
    }

    /// Replace the world, as when a new level is loaded.
    ///
    /// Existing actors are re-registered on the next fixed step.
    pub fn reset(&mut self, world: GravityWorld) {
        self.world = world;
        self.zones.clear();
        self.zone_entities.clear();
        self.actors.clear();
        self.actor_entities.clear();
    }

    pub fn body_of(&self, actor: Entity) -> Option<BodyId> {
        self.actors.get(&actor).copied()
    }

    pub fn zone_entity(&self, area: AreaId) -> Option<Entity> {
        self.zone_entities.get(&area).copied()
    }

    /// Effective gravity direction of an actor, once its body exists.
    pub fn effective_down(&self, actor: Entity) -> Option<Vec3> {
        self.world.effective_gravity_direction(self.body_of(actor)?)
    }

    pub fn is_in_transition(&self, actor: Entity) -> bool {
        self.body_of(actor)
            .is_some_and(|body| self.world.is_in_transition(body))
    }

    fn register_zone(&mut self, entity: Entity, area: AreaId) {
        if self.world.area(area).is_none() {
            tracing::warn!("Zone {entity} refers to unknown gravity area {area:?}");
            return;
        }
        self.zones.insert(entity, area);
        self.zone_entities.insert(area, entity);
    }

    fn release_zone(&mut self, entity: Entity) {
        if let Some(area) = self.zones.remove(&entity) {
            self.zone_entities.remove(&area);
            self.world.remove_area(area);
        }
    }

    fn register_actor(&mut self, entity: Entity) -> BodyId {
        if let Some(body) = self.body_of(entity) {
            return body;
        }
        let body = self.world.spawn_body();
        self.actors.insert(entity, body);
        self.actor_entities.insert(body, entity);
        body
    }

    /// Give an actor a fresh body outside every zone, dropping any transition.
    pub fn respawn_actor(&mut self, entity: Entity) -> BodyId {
        self.release_actor(entity);
        self.register_actor(entity)
    }

    fn release_actor(&mut self, entity: Entity) {
        if let Some(body) = self.actors.remove(&entity) {
            self.actor_entities.remove(&body);
            self.world.remove_body(body);
        }
    }

    /// Resolve a collision pair into (area, body), in either order.
    fn overlap(
        &self,
        (collider1, body1): (Entity, Option<Entity>),
        (collider2, body2): (Entity, Option<Entity>),
    ) -> Option<(AreaId, BodyId)> {
        let pair = |zone: Entity, actor: Entity| {
            Some((*self.zones.get(&zone)?, self.body_of(actor)?))
        };
        pair(collider1, body2.unwrap_or(collider2))
            .or_else(|| pair(collider2, body1.unwrap_or(collider1)))
    }

    /// Translate a core event into a message, dropping it if its entities are gone.
    fn translate(&self, event: GravityEvent) -> Option<GravityMessage> {
        let actor = |body: BodyId| self.actor_entities.get(&body).copied();
        let message = match event {
            GravityEvent::AreaEntered { body, area } => GravityMessage::ZoneEntered {
                actor: actor(body)?,
                zone: self.zone_entity(area)?,
            },
            GravityEvent::AreaExited { body, area } => GravityMessage::ZoneExited {
                actor: actor(body)?,
                zone: self.zone_entity(area)?,
            },
            GravityEvent::TransitionStarted {
                body,
                old_up,
                new_up,
            } => GravityMessage::TransitionStarted {
                actor: actor(body)?,
                old_up,
                new_up,
            },
            GravityEvent::TransitionCompleted { body, new_up, .. } => {
                GravityMessage::TransitionCompleted {
                    actor: actor(body)?,
                    new_up,
                }
            }
            GravityEvent::TransitionTimedOut { body, new_up, .. } => {
                GravityMessage::TransitionTimedOut {
                    actor: actor(body)?,
                    new_up,
                }
            }
        };
        Some(message)
    }
}

// ============================================================================
// Systems
// ============================================================================

/// Drop areas and bodies whose entities went away.
fn release_removed(
    mut sim: ResMut<GravitySimulation>,
    mut removed_zones: RemovedComponents<GravityZone>,
    mut removed_actors: RemovedComponents<GravityActor>,
) {
    for entity in removed_zones.read() {
        sim.release_zone(entity);
    }
    for entity in removed_actors.read() {
        sim.release_actor(entity);
    }
}

fn register_zones(
    mut sim: ResMut<GravitySimulation>,
    query: Query<(Entity, &GravityZone), Added<GravityZone>>,
) {
    for (entity, zone) in &query {
        sim.register_zone(entity, zone.area);
    }
}

/// Create bodies for new actors, and for actors that lost theirs on a level reset.
fn register_actors(mut sim: ResMut<GravitySimulation>, query: Query<Entity, With<GravityActor>>) {
    for entity in &query {
        if sim.body_of(entity).is_none() {
            let body = sim.register_actor(entity);
            tracing::debug!("Registered gravity actor {entity} as {body:?}");
        }
    }
}

/// Feed sensor overlaps into the hysteresis gate.
///
/// Starts are routed before ends. Avian steps once per fixed tick, so one
/// batch never holds both a start and an end for the same pair, and the
/// relative order of the two readers does not matter.
fn route_collisions(
    mut started: MessageReader<CollisionStart>,
    mut ended: MessageReader<CollisionEnd>,
    mut sim: ResMut<GravitySimulation>,
) {
    for event in started.read() {
        if let Some((area, body)) = sim.overlap(
            (event.collider1, event.body1),
            (event.collider2, event.body2),
        ) {
            sim.world.on_volume_enter(area, body);
        }
    }
    for event in ended.read() {
        if let Some((area, body)) = sim.overlap(
            (event.collider1, event.body1),
            (event.collider2, event.body2),
        ) {
            sim.world.on_volume_exit(area, body);
        }
    }
}

/// Advance the gravity world by one fixed step and publish what happened.
fn step_world(
    time: Res<Time<Fixed>>,
    mut sim: ResMut<GravitySimulation>,
    mut messages: MessageWriter<GravityMessage>,
) {
    sim.world.tick(time.delta_secs_f64());
    for event in sim.world.drain_events() {
        if let Some(message) = sim.translate(event) {
            messages.write(message);
        }
    }
}

/// Accelerate actors along their effective gravity direction.
fn apply_zone_gravity(
    time: Res<Time>,
    sim: Res<GravitySimulation>,
    mut query: Query<(Entity, &mut LinearVelocity), (With<GravityActor>, Without<ManualGravity>)>,
) {
    let dt = time.delta_secs();

    for (entity, mut velocity) in &mut query {
        let Some(down) = sim.effective_down(entity) else {
            continue;
        };
        // v += g * dt.
        velocity.0 += down * GRAVITY * dt;
    }
}

fn log_gravity_messages(mut messages: MessageReader<GravityMessage>, names: Query<&Name>) {
    let name = |entity: Entity| {
        names
            .get(entity)
            .map_or_else(|_| entity.to_string(), |name| name.to_string())
    };
    for message in messages.read() {
        match *message {
            GravityMessage::ZoneEntered { actor, zone } => {
                tracing::debug!("{} entered zone '{}'", name(actor), name(zone));
            }
            GravityMessage::ZoneExited { actor, zone } => {
                tracing::debug!("{} left zone '{}'", name(actor), name(zone));
            }
            GravityMessage::TransitionStarted {
                actor,
                old_up,
                new_up,
            } => {
                tracing::debug!("{} reorienting from {old_up} to {new_up}", name(actor));
            }
            GravityMessage::TransitionCompleted { actor, new_up } => {
                tracing::debug!("{} settled on up {new_up}", name(actor));
            }
            GravityMessage::TransitionTimedOut { actor, new_up } => {
                tracing::info!("{} snapped to up {new_up} after a timeout", name(actor));
            }
        }
    }
}

fn despawn_out_of_bounds(
    mut commands: Commands,
    query: Query<(Entity, &Position), With<DespawnOutOfBounds>>,
) {
    for (entity, position) in &query {
        if position.0.length() > BOUNDS_RADIUS {
            tracing::debug!("Despawning {entity}: left the level bounds");
            commands.entity(entity).despawn();
        }
    }
}

#[cfg(test)]
mod tests {
    use gravity_core::{AreaShape, GravityArea, LocalAxis, OrientedBox};

    use super::*;

    fn sim_with_zone() -> (GravitySimulation, Entity, Entity, AreaId, BodyId) {
        let mut sim = GravitySimulation::default();
        let area = sim.world_mut().add_area(
            GravityArea::new(
                AreaShape::BoxFace {
                    volume: OrientedBox::new(Vec3::ZERO, Vec3::splat(5.0)),
                    down: LocalAxis::PosX,
                },
                1,
                0.0,
            )
            .unwrap(),
        );
        let mut entities = World::new();
        let zone = entities.spawn_empty().id();
        let actor = entities.spawn_empty().id();
        sim.register_zone(zone, area);
        let body = sim.register_actor(actor);
        (sim, zone, actor, area, body)
    }

    #[test]
    fn test_overlap_resolves_either_order() {
        let (sim, zone, actor, area, body) = sim_with_zone();
        assert_eq!(
            sim.overlap((zone, Some(zone)), (actor, Some(actor))),
            Some((area, body))
        );
        assert_eq!(
            sim.overlap((actor, None), (zone, None)),
            Some((area, body))
        );
        assert_eq!(sim.overlap((actor, None), (actor, None)), None);
    }

    #[test]
    fn test_release_actor_forgets_body() {
        let (mut sim, zone, actor, area, body) = sim_with_zone();
        sim.world_mut().on_volume_enter(area, body);
        sim.release_actor(actor);

        assert_eq!(sim.body_of(actor), None);
        assert!(sim.world().body(body).is_none());
        assert_eq!(sim.overlap((zone, None), (actor, None)), None);
    }

    #[test]
    fn test_translate_maps_entities() {
        let (mut sim, zone, actor, area, body) = sim_with_zone();
        sim.world_mut().on_volume_enter(area, body);
        sim.world_mut().tick(0.1);

        let messages: Vec<_> = sim
            .world_mut()
            .drain_events()
            .into_iter()
            .filter_map(|event| sim.translate(event))
            .collect();
        assert!(matches!(
            messages[0],
            GravityMessage::ZoneEntered { actor: a, zone: z } if a == actor && z == zone
        ));
        assert!(matches!(
            messages[1],
            GravityMessage::TransitionStarted { actor: a, .. } if a == actor
        ));
        assert_eq!(sim.effective_down(actor), Some(Vec3::X));
    }
}
