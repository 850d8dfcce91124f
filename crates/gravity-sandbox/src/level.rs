//! Level loading and spawning.
//!
//! A level file extends the gravity placement with static solids, loose
//! props and a player spawn point. The built-in demo level is compiled in;
//! `--level` loads another file instead, falling back to the demo on error.

use std::path::Path;

use avian3d::prelude::*;
use bevy::prelude::*;
use gravity_core::{AreaShape, GravityArea, GravityError, LevelPlacement, OrientedBox};
use leafwing_input_manager::prelude::*;
use serde::Deserialize;

use crate::{
    input::PlayerAction,
    launch_params::LaunchParams,
    physics::{
        DespawnOutOfBounds, GameLayer, GravityActor, GravitySimulation, GravityZone,
        OrientationBlend,
    },
};

/// The demo level shipped with the sandbox.
const DEMO_LEVEL: &str = include_str!("../assets/levels/demo.ron");

/// Edge length of the prop crates, in meters.
const PROP_SIZE: f32 = 1.0;

/// Contents of a level file.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxLevel {
    /// Gravity configuration and areas.
    #[serde(default)]
    pub placement: LevelPlacement,
    /// Static boxes to stand on.
    #[serde(default)]
    pub solids: Vec<OrientedBox>,
    /// Spawn positions of dynamic prop crates.
    #[serde(default)]
    pub props: Vec<Vec3>,
    /// Player spawn position.
    #[serde(default)]
    pub spawn: Vec3,
}

impl SandboxLevel {
    pub fn from_ron_str(text: &str, source: &str) -> Result<Self, GravityError> {
        ron::from_str(text).map_err(|e| GravityError::Placement {
            source: source.to_string(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, GravityError> {
        let text = std::fs::read_to_string(path).map_err(|e| GravityError::Placement {
            source: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_ron_str(&text, &path.display().to_string())
    }

    /// The built-in demo level.
    pub fn demo() -> Result<Self, GravityError> {
        Self::from_ron_str(DEMO_LEVEL, "demo level")
    }
}

/// Sent after a level has been spawned.
#[derive(Message, Clone, Copy, Debug)]
pub struct LevelLoaded {
    pub spawn: Vec3,
}

/// Marker for entities that belong to the current level.
#[derive(Component)]
pub struct LevelEntity;

/// Plugin that loads the level at startup and reloads it on request.
pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<LevelLoaded>()
            .add_systems(Startup, spawn_level)
            .add_systems(Update, reload_level);
    }
}

/// Read the level named on the command line, or the demo level.
fn read_level(params: &LaunchParams) -> Option<SandboxLevel> {
    if let Some(path) = &params.level {
        match SandboxLevel::load(path) {
            Ok(level) => {
                tracing::info!("Loaded level {}", path.display());
                return Some(level);
            }
            Err(e) => tracing::warn!("{e}; falling back to the demo level"),
        }
    }
    match SandboxLevel::demo() {
        Ok(level) => Some(level),
        Err(e) => {
            tracing::error!("{e}");
            None
        }
    }
}

fn spawn_level(
    mut commands: Commands,
    params: Res<LaunchParams>,
    mut sim: ResMut<GravitySimulation>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut loaded: MessageWriter<LevelLoaded>,
) {
    let Some(level) = read_level(&params) else {
        return;
    };
    populate(&mut commands, &level, &mut sim, &mut meshes, &mut materials);
    loaded.write(LevelLoaded { spawn: level.spawn });
}

/// Tear down the current level and spawn it again from disk.
#[allow(clippy::too_many_arguments)]
fn reload_level(
    mut commands: Commands,
    params: Res<LaunchParams>,
    action_query: Query<&ActionState<PlayerAction>>,
    level_entities: Query<Entity, With<LevelEntity>>,
    mut sim: ResMut<GravitySimulation>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut loaded: MessageWriter<LevelLoaded>,
) {
    let Ok(action_state) = action_query.single() else {
        return;
    };
    if !action_state.just_pressed(&PlayerAction::ReloadLevel) {
        return;
    }
    let Some(level) = read_level(&params) else {
        return;
    };

    for entity in &level_entities {
        commands.entity(entity).despawn();
    }
    populate(&mut commands, &level, &mut sim, &mut meshes, &mut materials);
    loaded.write(LevelLoaded { spawn: level.spawn });
    tracing::info!("Level reloaded");
}

/// Replace the gravity world with the level's and spawn its entities.
fn populate(
    commands: &mut Commands,
    level: &SandboxLevel,
    sim: &mut GravitySimulation,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    let (world, ids) = level.placement.into_world();
    sim.reset(world);

    for (index, (placement, id)) in level.placement.areas.iter().zip(ids).enumerate() {
        let Some(area) = id else {
            continue;
        };
        let Some(volume) = sim.world().area(area).map(GravityArea::trigger_volume) else {
            continue;
        };
        let size = volume.size();
        let color = zone_color(&placement.shape);
        commands.spawn((
            Name::new(placement.label(index)),
            LevelEntity,
            GravityZone { area },
            RigidBody::Static,
            Collider::cuboid(size.x, size.y, size.z),
            Sensor,
            CollisionEventsEnabled,
            GameLayer::zone(),
            Mesh3d(meshes.add(Cuboid::from_size(size))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: color.with_alpha(0.12),
                alpha_mode: AlphaMode::Blend,
                unlit: true,
                ..default()
            })),
            Transform::from_translation(volume.center).with_rotation(volume.rotation),
        ));
    }

    let solid_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.55, 0.57, 0.6),
        perceptual_roughness: 0.9,
        ..default()
    });
    for solid in &level.solids {
        let size = solid.size();
        commands.spawn((
            LevelEntity,
            RigidBody::Static,
            Collider::cuboid(size.x, size.y, size.z),
            GameLayer::ground(),
            Mesh3d(meshes.add(Cuboid::from_size(size))),
            MeshMaterial3d(solid_material.clone()),
            Transform::from_translation(solid.center).with_rotation(solid.rotation),
        ));
    }

    let prop_mesh = meshes.add(Cuboid::from_length(PROP_SIZE));
    let prop_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.8, 0.5, 0.2),
        ..default()
    });
    for position in &level.props {
        commands.spawn((
            LevelEntity,
            GravityActor,
            OrientationBlend::default(),
            DespawnOutOfBounds,
            RigidBody::Dynamic,
            Collider::cuboid(PROP_SIZE, PROP_SIZE, PROP_SIZE),
            LockedAxes::ROTATION_LOCKED,
            GameLayer::actor(),
            Mesh3d(prop_mesh.clone()),
            MeshMaterial3d(prop_material.clone()),
            Transform::from_translation(*position),
        ));
    }

    tracing::info!(
        "Spawned level: {} gravity zones, {} solids, {} props",
        sim.world().areas().count(),
        level.solids.len(),
        level.props.len()
    );
}

/// Tint zones by kind.
pub fn zone_color(shape: &AreaShape) -> Color {
    match shape {
        AreaShape::BoxFace { .. } => Color::srgb(0.2, 0.6, 1.0),
        AreaShape::MeshFace { .. } => Color::srgb(0.8, 0.3, 1.0),
        AreaShape::GroundNormal { .. } => Color::srgb(0.3, 1.0, 0.4),
        AreaShape::DirectionalPull { .. } => Color::srgb(1.0, 0.7, 0.2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_level_parses() {
        let level = SandboxLevel::demo().unwrap();
        assert_eq!(level.placement.areas.len(), 5);
        assert!(!level.solids.is_empty());
        assert!(!level.props.is_empty());
    }

    #[test]
    fn test_demo_level_uses_every_shape() {
        let level = SandboxLevel::demo().unwrap();
        let has = |pred: fn(&AreaShape) -> bool| {
            level.placement.areas.iter().any(|area| pred(&area.shape))
        };
        assert!(has(|s| matches!(s, AreaShape::BoxFace { .. })));
        assert!(has(|s| matches!(s, AreaShape::MeshFace { .. })));
        assert!(has(|s| matches!(s, AreaShape::GroundNormal { .. })));
        assert!(has(|s| matches!(s, AreaShape::DirectionalPull { .. })));
    }

    #[test]
    fn test_demo_areas_are_valid() {
        let level = SandboxLevel::demo().unwrap();
        let (world, ids) = level.placement.into_world();
        assert!(ids.iter().all(Option::is_some));
        assert_eq!(world.areas().count(), level.placement.areas.len());
    }

    #[test]
    fn test_spawn_point_is_inside_arena() {
        let level = SandboxLevel::demo().unwrap();
        let arena = level.placement.areas[0].build().unwrap();
        assert!(arena.trigger_volume().contains(level.spawn));
    }

    #[test]
    fn test_minimal_level_uses_defaults() {
        let level = SandboxLevel::from_ron_str("()", "inline").unwrap();
        assert!(level.placement.areas.is_empty());
        assert_eq!(level.spawn, Vec3::ZERO);
    }

    #[test]
    fn test_bad_level_reports_source() {
        let err = SandboxLevel::from_ron_str("(solids: 3)", "broken.ron").unwrap_err();
        assert!(err.to_string().contains("broken.ron"));
    }
}
