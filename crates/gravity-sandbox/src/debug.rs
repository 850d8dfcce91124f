//! Debug drawing of gravity zones and actor gravity.
//!
//! Toggled with `G` or enabled from the start with `--debug-gizmos`.

use avian3d::prelude::*;
use bevy::prelude::*;
use gravity_core::OrientedBox;
use leafwing_input_manager::prelude::*;

use crate::{
    input::PlayerAction,
    launch_params::LaunchParams,
    level::zone_color,
    physics::{GravityActor, GravitySimulation, GravityZone},
};

/// Length of the gravity arrow drawn on each actor.
const ACTOR_ARROW_LENGTH: f32 = 2.0;

/// Whether debug gizmos are drawn.
#[derive(Resource, Default)]
pub struct DebugGizmos {
    pub enabled: bool,
}

pub struct DebugPlugin;

impl Plugin for DebugPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugGizmos>()
            .add_systems(Startup, configure_from_launch_params)
            .add_systems(
                Update,
                (
                    toggle_gizmos,
                    (draw_zones, draw_actor_gravity).run_if(gizmos_enabled),
                )
                    .chain(),
            );
    }
}

fn gizmos_enabled(debug: Res<DebugGizmos>) -> bool {
    debug.enabled
}

fn configure_from_launch_params(params: Res<LaunchParams>, mut debug: ResMut<DebugGizmos>) {
    debug.enabled = params.debug_gizmos;
}

fn toggle_gizmos(
    action_query: Query<&ActionState<PlayerAction>>,
    mut debug: ResMut<DebugGizmos>,
) {
    let Ok(action_state) = action_query.single() else {
        return;
    };
    if action_state.just_pressed(&PlayerAction::ToggleGizmos) {
        debug.enabled = !debug.enabled;
        let enabled = debug.enabled;
        tracing::info!("Gravity gizmos: {}", enabled);
    }
}

/// The 12 edges of a box, as pairs of world-space corners.
fn box_edges(volume: &OrientedBox) -> [(Vec3, Vec3); 12] {
    let corner = |x: f32, y: f32, z: f32| {
        volume.center + volume.rotation * (volume.half_extents * Vec3::new(x, y, z))
    };
    let c = [
        corner(-1.0, -1.0, -1.0),
        corner(1.0, -1.0, -1.0),
        corner(1.0, 1.0, -1.0),
        corner(-1.0, 1.0, -1.0),
        corner(-1.0, -1.0, 1.0),
        corner(1.0, -1.0, 1.0),
        corner(1.0, 1.0, 1.0),
        corner(-1.0, 1.0, 1.0),
    ];
    [
        (c[0], c[1]),
        (c[1], c[2]),
        (c[2], c[3]),
        (c[3], c[0]),
        (c[4], c[5]),
        (c[5], c[6]),
        (c[6], c[7]),
        (c[7], c[4]),
        (c[0], c[4]),
        (c[1], c[5]),
        (c[2], c[6]),
        (c[3], c[7]),
    ]
}

/// Outline each zone and point an arrow along its gravity.
fn draw_zones(mut gizmos: Gizmos, sim: Res<GravitySimulation>, zones: Query<&GravityZone>) {
    for zone in &zones {
        let Some(area) = sim.world().area(zone.area) else {
            continue;
        };
        let volume = area.trigger_volume();
        let color = zone_color(area.shape());
        for (start, end) in box_edges(&volume) {
            gizmos.line(start, end, color);
        }

        let direction = area.gravity_direction().normalize_or_zero();
        let length = volume.half_extents.min_element();
        gizmos.arrow(volume.center, volume.center + direction * length, color);
    }
}

/// Arrow along each actor's effective gravity; red while transitioning.
fn draw_actor_gravity(
    mut gizmos: Gizmos,
    sim: Res<GravitySimulation>,
    actors: Query<(Entity, &Position), With<GravityActor>>,
) {
    for (entity, position) in &actors {
        let Some(down) = sim.effective_down(entity) else {
            continue;
        };
        let color = if sim.is_in_transition(entity) {
            Color::srgb(1.0, 0.2, 0.2)
        } else {
            Color::WHITE
        };
        gizmos.arrow(position.0, position.0 + down * ACTOR_ARROW_LENGTH, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_edges_have_box_lengths() {
        let volume = OrientedBox::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Quat::from_rotation_y(0.4));
        let mut lengths: Vec<f32> = box_edges(&volume)
            .iter()
            .map(|(a, b)| a.distance(*b))
            .collect();
        lengths.sort_by(f32::total_cmp);

        for (i, expected) in [2.0, 4.0, 6.0].into_iter().enumerate() {
            for length in &lengths[i * 4..i * 4 + 4] {
                assert!((length - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_box_edges_stay_inside_volume() {
        let volume = OrientedBox::new(Vec3::ZERO, Vec3::splat(2.0))
            .with_rotation(Quat::from_rotation_x(1.0));
        let grown = OrientedBox {
            half_extents: volume.half_extents + Vec3::splat(1e-4),
            ..volume
        };
        for (start, end) in box_edges(&volume) {
            assert!(grown.contains(start));
            assert!(grown.contains((start + end) * 0.5));
        }
    }
}
